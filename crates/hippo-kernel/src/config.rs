//! Configuration loading from `~/.hippo/config.toml` with defaults.
//!
//! A missing file means defaults. A file that fails to parse or validate is
//! fatal: the caller gets `ConfigInvalid` and nothing starts.

use hippo_types::config::{default_data_dir, HippoConfig};
use hippo_types::error::{HippoError, HippoResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Load configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> HippoResult<HippoConfig> {
    let config_path = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    let config = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            HippoError::ConfigInvalid(format!("cannot read {}: {e}", config_path.display()))
        })?;
        let config: HippoConfig = toml::from_str(&contents).map_err(|e| {
            HippoError::ConfigInvalid(format!("{}: {e}", config_path.display()))
        })?;
        info!(path = %config_path.display(), "Loaded configuration");
        config
    } else {
        info!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
        HippoConfig::default()
    };

    config.validate()?;
    Ok(config)
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    hippo_home().join("config.toml")
}

/// Get the Hippo home directory (`$HIPPO_HOME` or `~/.hippo`).
pub fn hippo_home() -> PathBuf {
    default_data_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_missing_file() {
        let config = load_config(Some(Path::new("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config.scoring.half_life_days, 14.0);
        assert_eq!(config.tagging.tag_threshold, 5);
    }

    #[test]
    fn test_load_config_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "data_dir = \"{}\"", dir.path().display()).unwrap();
        writeln!(f, "[compaction]").unwrap();
        writeln!(f, "threshold = 0.5").unwrap();
        writeln!(f, "[inference]").unwrap();
        writeln!(f, "backend = \"offline\"").unwrap();
        drop(f);

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.compaction.threshold, 0.5);
        assert_eq!(config.compaction.workers, 2);
        assert_eq!(config.resolved_db_path(), dir.path().join("memory.db"));
    }

    #[test]
    fn test_parse_error_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scoring\nw_sim = ").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, HippoError::ConfigInvalid(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_validation_error_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scoring]\nhalf_life_days = -3.0\n").unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(HippoError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_wrong_type_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tagging]\ntag_threshold = \"five\"\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
