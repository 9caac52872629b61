//! Backend selection.
//!
//! The backend is a tagged variant resolved once per process from config and
//! then passed around as a fixed handle. Nothing re-detects it later.

use crate::drivers::command::find_executable;
use crate::drivers::{CommandDriver, ServerDriver};
use crate::generator::Generator;
use async_trait::async_trait;
use hippo_types::config::{BackendChoice, InferenceConfig};
use hippo_types::error::{HippoError, HippoResult};
use tracing::info;

/// The resolved inference backend.
pub enum InferenceBackend {
    /// Accelerated local server.
    Server(ServerDriver),
    /// Subprocess fallback.
    Command(CommandDriver),
    /// Nothing available. Every call reports `InferenceUnavailable`, so
    /// deterministic operations (scoring, recall, status) still work.
    Offline,
}

impl InferenceBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            InferenceBackend::Server(_) => "server",
            InferenceBackend::Command(_) => "command",
            InferenceBackend::Offline => "offline",
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, InferenceBackend::Offline)
    }
}

impl std::fmt::Debug for InferenceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("InferenceBackend").field(&self.kind()).finish()
    }
}

#[async_trait]
impl Generator for InferenceBackend {
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> HippoResult<String> {
        match self {
            InferenceBackend::Server(driver) => driver.generate(prompt, max_tokens, temperature).await,
            InferenceBackend::Command(driver) => driver.generate(prompt, max_tokens, temperature).await,
            InferenceBackend::Offline => Err(HippoError::InferenceUnavailable(
                "no inference backend configured".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        self.kind()
    }
}

/// Resolve the backend for this process.
///
/// `auto` prefers a configured server, then a command found on `PATH`, then
/// offline. Explicit choices are honored as given.
pub fn select_backend(config: &InferenceConfig) -> HippoResult<InferenceBackend> {
    let has_url = config
        .server_url
        .as_deref()
        .is_some_and(|u| !u.trim().is_empty());
    let command_found = config
        .command
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .and_then(find_executable)
        .is_some();

    let backend = match config.backend {
        BackendChoice::Server => InferenceBackend::Server(ServerDriver::new(config)?),
        BackendChoice::Command => InferenceBackend::Command(CommandDriver::new(config)?),
        BackendChoice::Offline => InferenceBackend::Offline,
        BackendChoice::Auto if has_url => InferenceBackend::Server(ServerDriver::new(config)?),
        BackendChoice::Auto if command_found => InferenceBackend::Command(CommandDriver::new(config)?),
        BackendChoice::Auto => InferenceBackend::Offline,
    };
    info!(backend = backend.kind(), "inference backend selected");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_without_anything_is_offline() {
        let backend = select_backend(&InferenceConfig::default()).unwrap();
        assert!(backend.is_offline());
    }

    #[test]
    fn test_auto_prefers_server() {
        let config = InferenceConfig {
            server_url: Some("http://127.0.0.1:8080".into()),
            command: Some("sh".into()),
            ..Default::default()
        };
        assert_eq!(select_backend(&config).unwrap().kind(), "server");
    }

    #[cfg(unix)]
    #[test]
    fn test_auto_falls_back_to_command() {
        let config = InferenceConfig {
            command: Some("sh".into()),
            ..Default::default()
        };
        assert_eq!(select_backend(&config).unwrap().kind(), "command");

        let missing = InferenceConfig {
            command: Some("definitely-not-a-real-binary-xyz".into()),
            ..Default::default()
        };
        assert!(select_backend(&missing).unwrap().is_offline());
    }

    #[test]
    fn test_offline_generate_unavailable() {
        let err = tokio_test::block_on(InferenceBackend::Offline.generate("p", 8, 0.0)).unwrap_err();
        assert!(err.is_recoverable_inference());
    }
}
