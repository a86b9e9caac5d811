//! Language-model client abstraction and the OpenAI chat-completions
//! implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::embedding::api_error_detail;
use crate::error::{RagError, Result};

/// A client that completes a prompt into an answer.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;

    /// Complete `prompt` under `system` instructions.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

fn provider_error(message: impl Into<String>) -> RagError {
    RagError::Provider { provider: "openai-chat".to_string(), message: message.into() }
}

/// LLM client backed by the OpenAI chat-completions API.
#[derive(Debug)]
pub struct OpenAiLlm {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

impl OpenAiLlm {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Configuration(
                "LLM API key must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| provider_error(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiLlm {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: prompt },
            ],
        };

        let response = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| provider_error(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = api_error_detail(response).await;
            return Err(provider_error(format!("API error {status}: {detail}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| provider_error(format!("invalid response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| provider_error("API returned no choices"))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}
