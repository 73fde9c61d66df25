// SPDX-License-Identifier: MIT

//! Model module - the Model Client capability and its adapters
//!
//! This module provides the core `ModelClient` trait and shared types.
//! Implementations live in their own submodules:
//! - [openai] - OpenAI chat completions API
//! - [retry] - retry-with-backoff wrapper for transient failures

pub mod openai;
pub mod retry;

use crate::adk::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
        }
    }
}

/// Decode a `messages` state field back into typed messages
pub fn messages_from_value(value: &serde_json::Value) -> Result<Vec<Message>, serde_json::Error> {
    serde_json::from_value(value.clone())
}

/// Encode messages for storage in a state field
pub fn messages_to_value(messages: &[Message]) -> serde_json::Value {
    serde_json::to_value(messages).unwrap_or_else(|_| serde_json::Value::Array(vec![]))
}

/// The Model Client capability: one completion per call.
///
/// Prompt templates, model selection and token accounting belong to the
/// implementation. Per-call timeouts are the implementation's concern as
/// well; timeouts must surface as [`ModelError::Transient`].
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Short provider/model label used in logs
    fn name(&self) -> &str;

    async fn complete(&self, conversation: &[Message]) -> Result<Message, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").role, Role::Assistant);
        assert_eq!(Message::tool("t").content, "t");
    }

    #[test]
    fn test_messages_value_encoding() {
        let messages = vec![Message::user("hi"), Message::assistant("hello")];
        let value = messages_to_value(&messages);
        assert_eq!(value[0]["role"], "user");
        assert_eq!(value[1]["content"], "hello");

        let decoded = messages_from_value(&value).unwrap();
        assert_eq!(decoded, messages);
    }

    #[test]
    fn test_messages_from_malformed_value() {
        assert!(messages_from_value(&json!("not a list")).is_err());
        assert!(messages_from_value(&json!([{"role": "robot", "content": ""}])).is_err());
    }
}
