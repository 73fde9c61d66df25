// SPDX-License-Identifier: MIT

//! OpenAI Model Client - chat completions API

use super::{GenerationConfig, Message, ModelClient, Role};
use crate::adk::error::ModelError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat completions client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
    config: GenerationConfig,
}

impl OpenAiClient {
    /// Create a client with an explicit key and endpoint
    pub fn new(
        api_key: impl Into<String>,
        model_name: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ModelError::ApiKeyMissing("openai".to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            model_name: model_name.into(),
            base_url: base_url.into(),
            config: GenerationConfig::default(),
        })
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    fn role_name(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            // Plain tool results are not tied to a tool_call_id here
            Role::Tool => "user",
        }
    }

    fn build_body(&self, conversation: &[Message]) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = conversation
            .iter()
            .map(|m| {
                json!({
                    "role": Self::role_name(m.role),
                    "content": m.content,
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages
        });

        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = self.config.max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(top_p) = self.config.top_p {
            body["top_p"] = json!(top_p);
        }
        body
    }

    /// Map a non-success HTTP status to the error taxonomy
    fn classify_status(
        status: StatusCode,
        retry_after_secs: Option<u64>,
        text: String,
    ) -> ModelError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            ModelError::RateLimited { retry_after_secs }
        } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            ModelError::Transient(format!("OpenAI returned {}: {}", status, text))
        } else {
            ModelError::api("openai", format!("{}: {}", status, text))
        }
    }

    fn parse_response(response: &serde_json::Value) -> Result<Message, ModelError> {
        let content = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .and_then(|choice| choice["message"]["content"].as_str())
            .ok_or_else(|| ModelError::InvalidResponse("No text choice in OpenAI response".into()))?;

        Ok(Message::assistant(content))
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, conversation: &[Message]) -> Result<Message, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(conversation);

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let text = resp.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, retry_after, text));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("OpenAI response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}
