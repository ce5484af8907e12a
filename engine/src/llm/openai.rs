//! OpenAI-compatible chat completions provider.
//!
//! Works against any endpoint implementing the `/chat/completions` shape
//! (OpenAI, OpenRouter, local gateways). The base URL and model come from
//! configuration.

use super::{ChatProvider, LlmError, Message};
use crate::config::LlmConfig;
use async_trait::async_trait;
use serde_json::json;

pub struct OpenAIProvider {
    config: LlmConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, messages: &[Message], temperature: f32) -> super::Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let mut api_messages = Vec::new();
        for msg in messages {
            api_messages.push(json!({
                "role": msg.role.to_string(),
                "content": msg.content
            }));
        }

        let payload = json!({
            "model": self.config.model,
            "messages": api_messages,
            "temperature": temperature,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(LlmError::RateLimited);
            }
            return Err(LlmError::Api(format!("{}: {}", status, text)));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        // Missing choices or content is not an error here: the chat client
        // records an empty assistant turn to keep turn parity.
        let content = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default();

        Ok(content.to_string())
    }
}
