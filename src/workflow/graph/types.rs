// SPDX-License-Identifier: MIT

//! Invocation types shared by the builder and the executor

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::workflow::router::{Router, Target};
use crate::workflow::state::{Delta, State};

/// Default bound on node executions per invocation
pub const DEFAULT_MAX_STEPS: usize = 50;

/// How many trailing node names a step-limit error carries
pub const RECENT_NODES: usize = 10;

/// The single outgoing edge of a node
#[derive(Clone)]
pub enum Edge {
    Static(Target),
    Conditional(Arc<dyn Router>),
}

impl Edge {
    /// Every target this edge can lead to
    pub fn targets(&self) -> Vec<Target> {
        match self {
            Edge::Static(target) => vec![target.clone()],
            Edge::Conditional(router) => router.targets(),
        }
    }
}

/// Cooperative cancellation signal, checked between steps.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-invocation options
#[derive(Clone, Default)]
pub struct InvokeConfig {
    /// Scopes checkpoints; needed for resume
    pub thread_id: Option<String>,
    /// Applied over the resumed state, overwriting checkpointed fields
    pub resume_input: Option<Delta>,
    pub cancel: Option<CancelToken>,
}

impl InvokeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_resume_input(mut self, input: Delta) -> Self {
        self.resume_input = Some(input);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// A finished invocation
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: State,
    /// Nodes entered during this invocation, in order
    pub visited: Vec<String>,
    /// Sequence number of the last checkpoint written, if any
    pub checkpoint_seq: Option<u64>,
    /// True when the run started from an existing checkpoint
    pub resumed: bool,
}
