// SPDX-License-Identifier: MIT

//! Steps: the units of work a graph node runs
//!
//! A Step sees the State read-only and answers with a [`Delta`]. All side
//! effects go through the [`Collaborators`] handed in by the caller.

use async_trait::async_trait;
use std::sync::Arc;

use crate::adk::error::StepError;
use crate::adk::model::ModelClient;
use crate::memory::KnowledgeStore;
use crate::workflow::registry::ToolRegistry;
use crate::workflow::state::{Delta, State};

/// External capabilities injected into every Step of a run
#[derive(Clone, Default)]
pub struct Collaborators {
    model: Option<Arc<dyn ModelClient>>,
    tools: ToolRegistry,
    knowledge: Option<Arc<dyn KnowledgeStore>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeStore>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn model(&self) -> Result<&Arc<dyn ModelClient>, StepError> {
        self.model
            .as_ref()
            .ok_or(StepError::MissingCollaborator("model client"))
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn knowledge(&self) -> Result<&Arc<dyn KnowledgeStore>, StepError> {
        self.knowledge
            .as_ref()
            .ok_or(StepError::MissingCollaborator("knowledge store"))
    }
}

/// A unit of work bound to a graph node.
///
/// `reads` and `writes` declare the State fields the Step touches. When a
/// graph has a schema, compile rejects declarations naming unknown fields,
/// and at run time a Step that declares `writes` may only return those.
/// Leaving both empty opts out of the checks.
#[async_trait]
pub trait Step: Send + Sync {
    fn reads(&self) -> Vec<String> {
        Vec::new()
    }

    fn writes(&self) -> Vec<String> {
        Vec::new()
    }

    async fn execute(&self, state: &State, ctx: &Collaborators) -> Result<Delta, StepError>;
}

type StepFn = Box<dyn Fn(&State) -> Result<Delta, StepError> + Send + Sync>;

/// A Step backed by a synchronous closure, for pure transformations
pub struct FnStep {
    reads: Vec<String>,
    writes: Vec<String>,
    func: StepFn,
}

impl FnStep {
    pub fn new(func: impl Fn(&State) -> Result<Delta, StepError> + Send + Sync + 'static) -> Self {
        Self {
            reads: Vec::new(),
            writes: Vec::new(),
            func: Box::new(func),
        }
    }

    pub fn reading<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reads = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn writing<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.writes = fields.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl Step for FnStep {
    fn reads(&self) -> Vec<String> {
        self.reads.clone()
    }

    fn writes(&self) -> Vec<String> {
        self.writes.clone()
    }

    async fn execute(&self, state: &State, _ctx: &Collaborators) -> Result<Delta, StepError> {
        (self.func)(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_step_returns_delta() {
        let step = FnStep::new(|state| {
            let n = state.require_i64("count")?;
            Ok(Delta::new().set("count", n + 1))
        })
        .reading(["count"])
        .writing(["count"]);

        let state = State::new().with("count", 1);
        let delta = step.execute(&state, &Collaborators::new()).await.unwrap();

        assert_eq!(delta.get("count"), Some(&serde_json::json!(2)));
        assert_eq!(step.reads(), vec!["count".to_string()]);
        assert_eq!(step.writes(), vec!["count".to_string()]);
        // input untouched
        assert_eq!(state.get("count"), Some(&serde_json::json!(1)));
    }

    #[tokio::test]
    async fn test_fn_step_propagates_invalid_state() {
        let step = FnStep::new(|state| {
            state.require_str("topic")?;
            Ok(Delta::new())
        });

        let err = step
            .execute(&State::new(), &Collaborators::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidState(_)));
    }

    #[test]
    fn test_missing_collaborators() {
        let ctx = Collaborators::new();
        assert!(matches!(
            ctx.model(),
            Err(StepError::MissingCollaborator("model client"))
        ));
        assert!(matches!(
            ctx.knowledge(),
            Err(StepError::MissingCollaborator("knowledge store"))
        ));
    }
}
