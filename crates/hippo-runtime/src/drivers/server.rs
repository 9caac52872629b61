//! OpenAI-compatible local inference server driver.
//!
//! Works with any server exposing `/v1/chat/completions`: mlx_lm.server,
//! llama-server, Ollama, LM Studio, vLLM.

use crate::generator::Generator;
use async_trait::async_trait;
use hippo_types::config::InferenceConfig;
use hippo_types::error::{HippoError, HippoResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Chat-completions client for a local server.
pub struct ServerDriver {
    endpoint: String,
    model: String,
    api_key: Zeroizing<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ServerDriver {
    /// Build a driver from config. Requires `server_url`.
    pub fn new(config: &InferenceConfig) -> HippoResult<Self> {
        let base_url = config
            .server_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| HippoError::ConfigInvalid("inference.server_url is not set".into()))?;

        let api_key = config
            .api_key_env
            .as_deref()
            .filter(|v| !v.is_empty())
            .and_then(|v| std::env::var(v).ok())
            .unwrap_or_default();

        let is_local = base_url.contains("localhost")
            || base_url.contains("127.0.0.1")
            || base_url.contains("[::1]");
        if !is_local {
            warn!(
                server_url = %base_url,
                "Inference server is not local; memory content will leave this machine"
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HippoError::ConfigInvalid(format!("HTTP client: {e}")))?;

        Ok(Self {
            endpoint: chat_endpoint(base_url),
            model: config.model.clone(),
            api_key: Zeroizing::new(api_key),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// `{base}/v1/chat/completions`, tolerating a base that already ends in `/v1`.
fn chat_endpoint(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

/// Pull the completion text out of a chat or legacy completions response.
fn completion_text(body: &str) -> HippoResult<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| HippoError::InferenceMalformedResponse(format!("server response: {e}")))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| HippoError::InferenceMalformedResponse("no choices in response".into()))?;
    choice
        .message
        .and_then(|m| m.content)
        .or(choice.text)
        .ok_or_else(|| HippoError::InferenceMalformedResponse("choice has no content".into()))
}

#[async_trait]
impl Generator for ServerDriver {
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> HippoResult<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature,
            stream: false,
        };

        let mut req = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.as_str().is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key.as_str()));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| HippoError::InferenceUnavailable(format!("{}: {e}", self.endpoint)))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| HippoError::InferenceUnavailable(format!("reading response: {e}")))?;

        if !status.is_success() {
            let snippet: String = text.chars().take(200).collect();
            return Err(HippoError::InferenceUnavailable(format!(
                "server returned {}: {snippet}",
                status.as_u16()
            )));
        }

        let completion = completion_text(&text)?;
        debug!(chars = completion.len(), max_tokens, "server completion received");
        Ok(completion)
    }

    fn name(&self) -> &str {
        "server"
    }
}
