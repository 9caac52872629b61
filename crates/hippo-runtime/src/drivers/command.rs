//! Subprocess inference driver, the fallback when no server is running
//! (`llama-cli`, `mlx_lm.generate`, or any program printing a completion).
//!
//! Arguments are templates: `{prompt}`, `{max_tokens}`, `{temperature}` and
//! `{model}` are substituted per call. The child runs with a cleared
//! environment plus a safe allow-list, and is killed on timeout.

use crate::generator::Generator;
use async_trait::async_trait;
use hippo_types::config::InferenceConfig;
use hippo_types::error::{HippoError, HippoResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variables passed through to the child.
pub const SAFE_ENV_VARS: &[&str] = &[
    "PATH", "HOME", "TMPDIR", "TMP", "TEMP", "LANG", "LC_ALL", "TERM",
];

/// Runs one subprocess per generation.
#[derive(Debug, Clone)]
pub struct CommandDriver {
    program: String,
    args: Vec<String>,
    model: String,
    timeout: Duration,
}

impl CommandDriver {
    /// Build a driver from config. Requires `command`.
    pub fn new(config: &InferenceConfig) -> HippoResult<Self> {
        let program = config
            .command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| HippoError::ConfigInvalid("inference.command is not set".into()))?;
        if find_executable(program).is_none() {
            warn!(program, "inference command not found on PATH; calls will fail");
        }
        Ok(Self {
            program: program.to_string(),
            args: config.args.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Arguments with placeholders substituted.
    pub fn render_args(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{max_tokens}", &max_tokens.to_string())
                    .replace("{temperature}", &temperature.to_string())
                    .replace("{model}", &self.model)
                    .replace("{prompt}", prompt)
            })
            .collect()
    }
}

#[async_trait]
impl Generator for CommandDriver {
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> HippoResult<String> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(self.render_args(prompt, max_tokens, temperature))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        sandbox_env(&mut cmd);

        let child = cmd
            .spawn()
            .map_err(|e| HippoError::InferenceUnavailable(format!("spawn {}: {e}", self.program)))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(HippoError::InferenceUnavailable(format!(
                    "{} failed: {e}",
                    self.program
                )))
            }
            Err(_) => {
                warn!(program = %self.program, timeout = ?self.timeout, "inference command timed out");
                return Err(HippoError::InferenceUnavailable(format!(
                    "{} timed out after {:?}",
                    self.program, self.timeout
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let snippet: String = stderr.trim().chars().take(200).collect();
            return Err(HippoError::InferenceUnavailable(format!(
                "{} exited with {}: {snippet}",
                self.program, output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        // Some CLIs echo the prompt before the completion.
        let completion = stdout
            .trim_start()
            .strip_prefix(prompt.trim())
            .unwrap_or(stdout.as_ref())
            .trim()
            .to_string();
        debug!(program = %self.program, chars = completion.len(), "command completion received");
        Ok(completion)
    }

    fn name(&self) -> &str {
        "command"
    }
}

/// Clear the child's environment and re-add only the allow-listed variables.
fn sandbox_env(cmd: &mut tokio::process::Command) {
    cmd.env_clear();
    for var in SAFE_ENV_VARS {
        if let Ok(val) = std::env::var(var) {
            cmd.env(var, val);
        }
    }
}

/// Resolve `program` to a file: as given when it contains a path separator,
/// otherwise by searching `PATH`.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}
