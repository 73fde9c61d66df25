// SPDX-License-Identifier: MIT

//! Runtime configuration from environment variables
//!
//! | Variable                   | Default                     |
//! |----------------------------|-----------------------------|
//! | `OPENAI_API_KEY`           | none                        |
//! | `OPENAI_BASE_URL`          | `https://api.openai.com/v1` |
//! | `STEPGRAPH_MODEL`          | `gpt-4-turbo`               |
//! | `STEPGRAPH_MAX_STEPS`      | `50`                        |
//! | `STEPGRAPH_MAX_RETRIES`    | `3`                         |
//! | `STEPGRAPH_TIMEOUT_SECS`   | `60`                        |
//! | `STEPGRAPH_CHECKPOINT_DIR` | none (in-memory store)      |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::adk::error::ModelError;
use crate::adk::model::openai::{OpenAiClient, DEFAULT_BASE_URL};
use crate::adk::model::retry::{RetryPolicy, RetryingClient};
use crate::adk::model::ModelClient;
use crate::workflow::graph::DEFAULT_MAX_STEPS;

pub const DEFAULT_MODEL: &str = "gpt-4-turbo";
pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {key} has invalid value '{value}': {message}")]
    Invalid {
        key: String,
        value: String,
        message: String,
    },

    #[error("Environment variable {0} contains invalid UTF-8")]
    NotUnicode(String),
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_steps: usize,
    pub max_retries: usize,
    pub timeout: Duration,
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            checkpoint_dir: None,
        }
    }
}

impl RuntimeConfig {
    /// Read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(key.to_string())),
        })
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<Option<String>, ConfigError>,
    {
        let get = |key: &str| -> Result<Option<String>, ConfigError> {
            Ok(lookup(key)?.filter(|v| !v.trim().is_empty()))
        };
        let defaults = Self::default();

        Ok(Self {
            api_key: get("OPENAI_API_KEY")?,
            base_url: get("OPENAI_BASE_URL")?.unwrap_or(defaults.base_url),
            model: get("STEPGRAPH_MODEL")?.unwrap_or(defaults.model),
            max_steps: parse(&get, "STEPGRAPH_MAX_STEPS")?.unwrap_or(defaults.max_steps),
            max_retries: parse(&get, "STEPGRAPH_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            timeout: parse(&get, "STEPGRAPH_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            checkpoint_dir: get("STEPGRAPH_CHECKPOINT_DIR")?.map(PathBuf::from),
        })
    }

    /// OpenAI client wrapped in the configured retry policy
    pub fn model_client(&self) -> Result<Arc<dyn ModelClient>, ModelError> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| ModelError::ApiKeyMissing("openai".to_string()))?;
        let client = OpenAiClient::new(api_key, &self.model, &self.base_url, self.timeout)?;
        log::info!("Using model {} at {}", self.model, self.base_url);
        Ok(Arc::new(RetryingClient::new(client, self.retry_policy())))
    }

    /// `max_retries` counts retries, so the first attempt comes on top
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries + 1)
    }
}

fn parse<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Result<Option<String>, ConfigError>,
{
    match get(key)? {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                message: e.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Result<Option<String>, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| Ok(map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_key, None);
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4-turbo");
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.checkpoint_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1"),
            ("STEPGRAPH_MODEL", "gpt-4o-mini"),
            ("STEPGRAPH_MAX_STEPS", " 12 "),
            ("STEPGRAPH_MAX_RETRIES", "5"),
            ("STEPGRAPH_TIMEOUT_SECS", "5"),
            ("STEPGRAPH_CHECKPOINT_DIR", "/tmp/checkpoints"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_steps, 12);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(
            config.checkpoint_dir,
            Some(PathBuf::from("/tmp/checkpoints"))
        );
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config =
            RuntimeConfig::from_lookup(lookup(&[("OPENAI_API_KEY", ""), ("STEPGRAPH_MODEL", "  ")]))
                .unwrap();
        assert_eq!(config.api_key, None);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_invalid_number() {
        let err = RuntimeConfig::from_lookup(lookup(&[("STEPGRAPH_MAX_STEPS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("STEPGRAPH_MAX_STEPS"));
        assert!(err.to_string().contains("many"));
    }

    #[test]
    fn test_retries_exclude_first_attempt() {
        let config = RuntimeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.retry_policy().max_attempts, 4);

        let config = RuntimeConfig::from_lookup(lookup(&[("STEPGRAPH_MAX_RETRIES", "0")])).unwrap();
        assert_eq!(config.retry_policy().max_attempts, 1);
    }

    #[test]
    fn test_model_client_needs_key() {
        let config = RuntimeConfig::default();
        assert!(matches!(
            config.model_client(),
            Err(ModelError::ApiKeyMissing(_))
        ));

        let config = RuntimeConfig {
            api_key: Some("sk-test".into()),
            ..RuntimeConfig::default()
        };
        assert_eq!(config.model_client().unwrap().name(), "gpt-4-turbo");
    }
}
