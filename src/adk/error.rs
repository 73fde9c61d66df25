// SPDX-License-Identifier: MIT

//! Typed error handling for stepgraph
//!
//! Errors are layered the way they surface:
//! - collaborator errors (`ModelError`, `ToolError`, `MemoryError`)
//! - `StepError`, returned by a single Step
//! - `GraphError`, returned by compile and by the executor
//! - `RunError`, a `GraphError` annotated with how far the run got

use thiserror::Error;

/// Errors reported by a Model Client
#[derive(Debug, Error)]
pub enum ModelError {
    /// Timeout, connection reset or a 5xx from the provider
    #[error("Transient model error: {0}")]
    Transient(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// Non-retryable API error
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },
}

impl ModelError {
    /// True for the TransientModelError family (retry may help)
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited { .. })
    }

    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::Transient(err.to_string())
        } else {
            Self::InvalidResponse(err.to_string())
        }
    }
}

/// Errors reported by the Tool Registry
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool not found during execution
    #[error("Tool '{name}' not found")]
    NotFound { name: String },

    /// The tool ran and failed
    #[error("Tool '{name}' failed: {message}")]
    Execution { name: String, message: String },
}

impl ToolError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn execution(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Errors reported by checkpoint and knowledge stores
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Sequence numbers for a thread must strictly increase
    #[error("Checkpoint sequence {given} for thread '{thread_id}' is not after {latest}")]
    OutOfOrder {
        thread_id: String,
        given: u64,
        latest: u64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors a Step may return
#[derive(Debug, Error)]
pub enum StepError {
    /// Required field missing or malformed
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// The Step needs a collaborator the caller did not supply
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}

impl StepError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }
}

/// Compile-time and run-time graph errors
#[derive(Debug, Error)]
pub enum GraphError {
    /// Misconfigured graph; raised by compile, never by invoke
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// A Step or Router saw a missing or malformed field
    #[error("Invalid state in node '{node}': {message}")]
    InvalidState { node: String, message: String },

    /// Model Client failure after any retries were exhausted
    #[error("Transient model error in node '{node}': {source}")]
    TransientModel { node: String, source: ModelError },

    /// Non-transient Model Client failure
    #[error("Model error in node '{node}': {source}")]
    Model { node: String, source: ModelError },

    /// Tool failure a Step chose not to fold into state
    #[error("Tool error in node '{node}': {source}")]
    Tool { node: String, source: ToolError },

    /// Knowledge store failure inside a Step
    #[error("Memory error in node '{node}': {source}")]
    Memory { node: String, source: MemoryError },

    #[error("Node '{node}' needs a {collaborator} but none was supplied")]
    MissingCollaborator {
        node: String,
        collaborator: &'static str,
    },

    /// A Router named a node that is not in the graph
    #[error("Router on '{from}' returned unknown node '{target}'")]
    InvalidRoute { from: String, target: String },

    /// Max steps reached, carries the most recent node names
    #[error("Step limit of {limit} exceeded, recent nodes: {recent:?}")]
    StepLimitExceeded { limit: usize, recent: Vec<String> },

    #[error("Checkpoint write failed for thread '{thread_id}': {source}")]
    CheckpointWrite {
        thread_id: String,
        source: MemoryError,
    },

    #[error("Checkpoint load failed for thread '{thread_id}': {source}")]
    CheckpointLoad {
        thread_id: String,
        source: MemoryError,
    },

    /// Cancellation observed between steps
    #[error("Run cancelled before node '{next}'")]
    Cancelled { next: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl GraphError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Attribute a Step failure to the node that produced it
    pub fn from_step(node: &str, err: StepError) -> Self {
        let node = node.to_string();
        match err {
            StepError::InvalidState(message) => Self::InvalidState { node, message },
            StepError::Model(source) if source.is_transient() => {
                Self::TransientModel { node, source }
            }
            StepError::Model(source) => Self::Model { node, source },
            StepError::Tool(source) => Self::Tool { node, source },
            StepError::Memory(source) => Self::Memory { node, source },
            StepError::MissingCollaborator(collaborator) => {
                Self::MissingCollaborator { node, collaborator }
            }
        }
    }

    /// Short machine-friendly name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "GraphValidationError",
            Self::InvalidState { .. } => "InvalidStateError",
            Self::TransientModel { .. } => "TransientModelError",
            Self::Model { .. } => "ModelError",
            Self::Tool {
                source: ToolError::NotFound { .. },
                ..
            } => "ToolNotFoundError",
            Self::Tool { .. } => "ToolExecutionError",
            Self::Memory { .. } => "MemoryError",
            Self::MissingCollaborator { .. } => "MissingCollaborator",
            Self::InvalidRoute { .. } => "InvalidRouteError",
            Self::StepLimitExceeded { .. } => "GraphStepLimitExceeded",
            Self::CheckpointWrite { .. } => "CheckpointWriteError",
            Self::CheckpointLoad { .. } => "CheckpointLoadError",
            Self::Cancelled { .. } => "Cancelled",
            Self::Io(_) | Self::Json(_) | Self::Yaml(_) => "LoadError",
        }
    }
}

/// A failed invocation: the cause plus how far execution got
#[derive(Debug, Error)]
#[error("{error} (last completed node: {})", .last_completed.as_deref().unwrap_or("<none>"))]
pub struct RunError {
    #[source]
    pub error: GraphError,
    /// Last node whose delta was merged (and checkpointed, if configured)
    pub last_completed: Option<String>,
    /// Every node entered during this invocation, in order
    pub visited: Vec<String>,
}

impl RunError {
    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ModelError::Transient("timeout".into()).is_transient());
        assert!(ModelError::RateLimited {
            retry_after_secs: Some(2)
        }
        .is_transient());
        assert!(!ModelError::ApiKeyMissing("openai".into()).is_transient());
        assert!(!ModelError::api("openai", "bad request").is_transient());
    }

    #[test]
    fn test_from_step_maps_kinds() {
        let err = GraphError::from_step("plan", StepError::invalid_state("topic missing"));
        assert_eq!(err.kind(), "InvalidStateError");

        let err = GraphError::from_step(
            "plan",
            StepError::Model(ModelError::Transient("reset".into())),
        );
        assert_eq!(err.kind(), "TransientModelError");

        let err = GraphError::from_step(
            "plan",
            StepError::Model(ModelError::InvalidResponse("empty".into())),
        );
        assert_eq!(err.kind(), "ModelError");

        let err = GraphError::from_step("act", StepError::Tool(ToolError::not_found("search")));
        assert_eq!(err.kind(), "ToolNotFoundError");

        let err = GraphError::from_step(
            "act",
            StepError::Tool(ToolError::execution("search", "boom")),
        );
        assert_eq!(err.kind(), "ToolExecutionError");
    }

    #[test]
    fn test_run_error_display_names_last_node() {
        let err = RunError {
            error: GraphError::validation("x"),
            last_completed: Some("evaluate".to_string()),
            visited: vec!["plan".into(), "evaluate".into()],
        };
        assert!(err.to_string().contains("last completed node: evaluate"));

        let err = RunError {
            error: GraphError::validation("x"),
            last_completed: None,
            visited: vec![],
        };
        assert!(err.to_string().contains("<none>"));
    }
}
