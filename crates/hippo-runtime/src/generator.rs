//! Text generation contract.

use async_trait::async_trait;
use hippo_types::error::HippoResult;

/// A text generator: one prompt in, one completion out.
///
/// Implementations report an unreachable or failing backend as
/// `InferenceUnavailable`; callers skip the current unit and continue.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> HippoResult<String>;

    /// Short backend name for logs and status output.
    fn name(&self) -> &str;
}
