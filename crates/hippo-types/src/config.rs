//! Configuration types for the Hippo engine.
//!
//! Every section carries `#[serde(default)]`, so a config file only needs the
//! keys it wants to change. `HippoConfig::validate` is the single gate that
//! turns nonsense values into `ConfigInvalid` before any component starts.

use crate::error::{HippoError, HippoResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HippoConfig {
    /// Base directory for the database and working files.
    pub data_dir: PathBuf,
    /// Database path. Defaults to `<data_dir>/memory.db`.
    pub db_path: Option<PathBuf>,
    /// Session summary log. Defaults to `<data_dir>/working/Session_Summary_Log.md`.
    pub session_log: Option<PathBuf>,
    pub storage: StorageConfig,
    pub scoring: ScoringConfig,
    pub compaction: CompactionConfig,
    pub consolidation: ConsolidationConfig,
    pub tagging: TaggingConfig,
    pub prediction: PredictionConfig,
    pub inference: InferenceConfig,
}

impl Default for HippoConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_path: None,
            session_log: None,
            storage: StorageConfig::default(),
            scoring: ScoringConfig::default(),
            compaction: CompactionConfig::default(),
            consolidation: ConsolidationConfig::default(),
            tagging: TaggingConfig::default(),
            prediction: PredictionConfig::default(),
            inference: InferenceConfig::default(),
        }
    }
}

/// `$HIPPO_HOME`, else `~/.hippo`, else `./.hippo`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HIPPO_HOME") {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }
    dirs::home_dir()
        .map(|h| h.join(".hippo"))
        .unwrap_or_else(|| PathBuf::from(".hippo"))
}

impl HippoConfig {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("memory.db"))
    }

    pub fn resolved_session_log(&self) -> PathBuf {
        self.session_log.clone().unwrap_or_else(|| {
            self.data_dir
                .join("working")
                .join("Session_Summary_Log.md")
        })
    }

    /// Check every section. The first violation wins.
    pub fn validate(&self) -> HippoResult<()> {
        self.storage.validate()?;
        self.scoring.validate()?;
        self.compaction.validate()?;
        self.consolidation.validate()?;
        self.tagging.validate()?;
        self.prediction.validate()?;
        self.inference.validate()?;
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> HippoError {
    HippoError::ConfigInvalid(msg.into())
}

fn check_finite_non_negative(name: &str, value: f64) -> HippoResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(format!(
            "{name} must be a finite, non-negative number (got {value})"
        )));
    }
    Ok(())
}

/// Lock handling for the SQLite store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite `busy_timeout` applied to every connection.
    pub busy_timeout_ms: u64,
    /// Backoff applied when a write still finds the database locked.
    pub retry: RetryPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> HippoResult<()> {
        self.retry.validate()
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// First delay in milliseconds.
    pub min_delay_ms: u64,
    /// Cap on any single delay in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter factor in `[0, 1]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_delay_ms: 50,
            max_delay_ms: 2_000,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    fn validate(&self) -> HippoResult<()> {
        if self.max_attempts == 0 {
            return Err(invalid("storage.retry.max_attempts must be at least 1"));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(invalid(
                "storage.retry.min_delay_ms must not exceed max_delay_ms",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(invalid("storage.retry.jitter must be within [0, 1]"));
        }
        Ok(())
    }
}

/// Composite relevance weights and decay parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of query similarity.
    pub w_sim: f64,
    /// Weight of recency decay.
    pub w_rec: f64,
    /// Weight of access frequency.
    pub w_freq: f64,
    /// Age in days at which recency halves.
    pub half_life_days: f64,
    /// Access count at which frequency saturates to 1.
    pub saturation_count: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            w_sim: 0.6,
            w_rec: 0.3,
            w_freq: 0.1,
            half_life_days: 14.0,
            saturation_count: 50,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> HippoResult<()> {
        check_finite_non_negative("scoring.w_sim", self.w_sim)?;
        check_finite_non_negative("scoring.w_rec", self.w_rec)?;
        check_finite_non_negative("scoring.w_freq", self.w_freq)?;
        if !self.half_life_days.is_finite() || self.half_life_days <= 0.0 {
            return Err(invalid(format!(
                "scoring.half_life_days must be positive (got {})",
                self.half_life_days
            )));
        }
        if self.saturation_count == 0 {
            return Err(invalid("scoring.saturation_count must be at least 1"));
        }
        Ok(())
    }
}

/// Deduplication pass settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Minimum Jaccard overlap for a pair to be classified.
    pub threshold: f64,
    /// Above this many active records, only pairs touching records changed
    /// since the previous run are considered.
    pub full_scan_limit: usize,
    /// Cap on classification calls per run; the rest wait for the next run.
    pub max_pairs_per_run: usize,
    /// Concurrent classification calls.
    pub workers: usize,
    /// Generation budget of one classification call.
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            full_scan_limit: 500,
            max_pairs_per_run: 200,
            workers: 2,
            max_tokens: 512,
            temperature: 0.1,
        }
    }
}

impl CompactionConfig {
    fn validate(&self) -> HippoResult<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(invalid(format!(
                "compaction.threshold must be within [0, 1] (got {})",
                self.threshold
            )));
        }
        if self.workers == 0 {
            return Err(invalid("compaction.workers must be at least 1"));
        }
        if self.max_pairs_per_run == 0 {
            return Err(invalid("compaction.max_pairs_per_run must be at least 1"));
        }
        check_finite_non_negative("compaction.temperature", self.temperature as f64)?;
        Ok(())
    }
}

/// Session consolidation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Session entries handled per run.
    pub max_entries_per_run: usize,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.3,
            max_entries_per_run: 8,
        }
    }
}

impl ConsolidationConfig {
    fn validate(&self) -> HippoResult<()> {
        check_finite_non_negative("consolidation.temperature", self.temperature as f64)?;
        if self.max_entries_per_run == 0 {
            return Err(invalid(
                "consolidation.max_entries_per_run must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Entity tagging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    /// Batch mode skips records that already have this many tags.
    pub tag_threshold: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub workers: usize,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            tag_threshold: 5,
            max_tokens: 256,
            temperature: 0.3,
            workers: 2,
        }
    }
}

impl TaggingConfig {
    fn validate(&self) -> HippoResult<()> {
        check_finite_non_negative("tagging.temperature", self.temperature as f64)?;
        if self.workers == 0 {
            return Err(invalid("tagging.workers must be at least 1"));
        }
        Ok(())
    }
}

/// Briefing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Most recent session summaries read into the briefing.
    pub recent_summaries: usize,
    /// Top-scored records listed under each open thread.
    pub related_per_thread: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            recent_summaries: 5,
            related_per_thread: 3,
            max_tokens: 1024,
            temperature: 0.3,
        }
    }
}

impl PredictionConfig {
    fn validate(&self) -> HippoResult<()> {
        check_finite_non_negative("prediction.temperature", self.temperature as f64)?;
        if self.recent_summaries == 0 {
            return Err(invalid("prediction.recent_summaries must be at least 1"));
        }
        Ok(())
    }
}

/// Which inference backend to resolve at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendChoice {
    /// Server if a URL is configured, else command, else offline.
    #[default]
    Auto,
    /// OpenAI-compatible local server (mlx_lm.server, llama-server, Ollama).
    Server,
    /// Subprocess fallback (llama-cli and friends).
    Command,
    /// No backend: every inference call reports unavailable.
    Offline,
}

/// Inference backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub backend: BackendChoice,
    /// Base URL of the local server, e.g. `http://127.0.0.1:8080`.
    pub server_url: Option<String>,
    /// Model name sent to the server, or substituted for `{model}` in args.
    pub model: String,
    /// Environment variable holding an optional bearer token.
    pub api_key_env: Option<String>,
    /// Executable for the command backend.
    pub command: Option<String>,
    /// Arguments; `{prompt}`, `{max_tokens}`, `{temperature}`, `{model}` are substituted.
    pub args: Vec<String>,
    /// Per-call timeout.
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            server_url: None,
            model: "mlx-community/Mistral-7B-Instruct-v0.3-4bit".to_string(),
            api_key_env: None,
            command: None,
            args: vec![
                "-m".to_string(),
                "{model}".to_string(),
                "-n".to_string(),
                "{max_tokens}".to_string(),
                "--temp".to_string(),
                "{temperature}".to_string(),
                "-p".to_string(),
                "{prompt}".to_string(),
            ],
            timeout_secs: 120,
        }
    }
}

impl InferenceConfig {
    fn validate(&self) -> HippoResult<()> {
        if self.timeout_secs == 0 {
            return Err(invalid("inference.timeout_secs must be at least 1"));
        }
        match self.backend {
            BackendChoice::Server if self.server_url.as_deref().unwrap_or("").is_empty() => Err(
                invalid("inference.backend = \"server\" requires inference.server_url"),
            ),
            BackendChoice::Command if self.command.as_deref().unwrap_or("").is_empty() => Err(
                invalid("inference.backend = \"command\" requires inference.command"),
            ),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        HippoConfig::default().validate().unwrap();
    }

    #[test]
    fn test_negative_half_life_rejected() {
        let mut config = HippoConfig::default();
        config.scoring.half_life_days = -14.0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, HippoError::ConfigInvalid(_)));
        assert!(err.to_string().contains("half_life_days"));
    }

    #[test]
    fn test_zero_half_life_rejected() {
        let mut config = HippoConfig::default();
        config.scoring.half_life_days = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = HippoConfig::default();
        config.compaction.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_backend_requires_url() {
        let mut config = HippoConfig::default();
        config.inference.backend = BackendChoice::Server;
        assert!(config.validate().is_err());
        config.inference.server_url = Some("http://127.0.0.1:8080".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml() {
        let config: HippoConfig = toml::from_str(
            r#"
            [scoring]
            half_life_days = 7.0

            [inference]
            backend = "offline"
            "#,
        )
        .unwrap();
        assert_eq!(config.scoring.half_life_days, 7.0);
        assert_eq!(config.scoring.w_sim, 0.6);
        assert_eq!(config.inference.backend, BackendChoice::Offline);
        assert_eq!(config.compaction.threshold, 0.3);
        assert_eq!(config.compaction.max_tokens, 512);
        assert_eq!(config.compaction.temperature, 0.1);
    }

    #[test]
    fn test_compaction_temperature_validated() {
        let mut config = HippoConfig::default();
        config.compaction.temperature = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolved_paths() {
        let config = HippoConfig {
            data_dir: PathBuf::from("/tmp/hippo-test"),
            ..Default::default()
        };
        assert_eq!(
            config.resolved_db_path(),
            PathBuf::from("/tmp/hippo-test/memory.db")
        );
        assert!(config
            .resolved_session_log()
            .ends_with("working/Session_Summary_Log.md"));
    }
}
