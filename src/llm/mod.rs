
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::DeepSeekConfig;
use crate::{RagError, Result};

/// Prompt-to-text backend. One synchronous call per answer; failures surface
/// to the caller without retry.
pub trait GenerationBackend: Send + Sync {
    fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String>;
}

/// Minimal client for a DeepSeek-compatible chat-completions API.
#[derive(Debug, Clone)]
pub struct DeepSeekClient {
    base_url: Url,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

impl DeepSeekClient {
    #[inline]
    pub fn new(config: &DeepSeekConfig, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RagError::Config(
                "DeepSeek API key must not be empty".to_string(),
            ));
        }

        // A trailing slash keeps the base path intact when joining endpoints.
        let base_url = Url::parse(&format!("{}/", config.base_url.trim_end_matches('/')))
            .map_err(|e| RagError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            agent,
        })
    }

    fn complete(&self, prompt: &str, system_prompt: Option<&str>) -> anyhow::Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = CompletionRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages,
        };

        let url = self
            .base_url
            .join("chat/completions")
            .context("Failed to build completions URL")?;

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize completion request")?;

        debug!(
            "Requesting completion from {} (prompt length: {})",
            url,
            prompt.len()
        );

        let auth = format!("Bearer {}", self.api_key);
        let response_text = self
            .agent
            .post(url.as_str())
            .header("Authorization", auth)
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .context("Completion request failed")?;

        let response: CompletionResponse = serde_json::from_str(&response_text)
            .context("Failed to parse completion response")?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .context("API returned no choices")?;

        Ok(choice.message.content.trim().to_string())
    }
}

impl GenerationBackend for DeepSeekClient {
    #[inline]
    fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        self.complete(prompt, system_prompt)
            .map_err(|e| RagError::Generation(format!("{e:#}")))
    }
}
