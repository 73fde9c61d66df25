// SPDX-License-Identifier: MIT

//! Checkpoint Store: short-term memory keyed by thread identifier
//!
//! For one thread, checkpoints are totally ordered by `seq`. The executor
//! writes one after every completed node and resumes from the latest.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::adk::error::MemoryError;
use crate::workflow::state::State;

/// Durable snapshot of a thread's state after one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    pub thread_id: String,
    /// Strictly increasing per thread
    pub seq: u64,
    /// Node whose delta produced this snapshot
    pub node: String,
    /// Node the run would enter next; `None` once the run reached its end
    #[serde(default)]
    pub next: Option<String>,
    pub state: State,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(thread_id: impl Into<String>, seq: u64, node: impl Into<String>, state: State) -> Self {
        Self {
            id: Uuid::new_v4(),
            thread_id: thread_id.into(),
            seq,
            node: node.into(),
            next: None,
            state,
            created_at: Utc::now(),
        }
    }

    pub fn with_next(mut self, next: Option<String>) -> Self {
        self.next = next;
        self
    }

    /// True if the run that wrote this checkpoint stopped before its end
    pub fn is_pending(&self) -> bool {
        self.next.is_some()
    }
}

/// Persist and resume workflow state by thread identifier
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Store a checkpoint; its `seq` must exceed the thread's latest
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), MemoryError>;

    /// Latest checkpoint for the thread, `None` if the thread is unknown
    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, MemoryError>;

    /// Full history for the thread, oldest first
    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, MemoryError>;
}

/// Reject a write that would break the per-thread total order
pub(crate) fn ensure_after(
    latest: Option<&Checkpoint>,
    checkpoint: &Checkpoint,
) -> Result<(), MemoryError> {
    match latest {
        Some(prev) if checkpoint.seq <= prev.seq => Err(MemoryError::OutOfOrder {
            thread_id: checkpoint.thread_id.clone(),
            given: checkpoint.seq,
            latest: prev.seq,
        }),
        _ => Ok(()),
    }
}

/// Process-local checkpoint store; safe to share between concurrent runs
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    threads: Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads with at least one checkpoint
    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }

    pub async fn clear(&self) {
        self.threads.write().await.clear();
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), MemoryError> {
        let mut threads = self.threads.write().await;
        let history = threads.entry(checkpoint.thread_id.clone()).or_default();
        ensure_after(history.last(), &checkpoint)?;
        history.push(checkpoint);
        Ok(())
    }

    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, MemoryError> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).and_then(|h| h.last().cloned()))
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, MemoryError> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(topic: &str) -> State {
        State::new().with("topic", topic)
    }

    #[tokio::test]
    async fn test_save_and_load_latest() {
        let store = InMemoryCheckpointStore::new();
        store
            .save(Checkpoint::new("t1", 1, "plan", state("a")))
            .await
            .unwrap();
        store
            .save(Checkpoint::new("t1", 2, "evaluate", state("b")))
            .await
            .unwrap();

        let latest = store.load_latest("t1").await.unwrap().unwrap();
        assert_eq!(latest.seq, 2);
        assert_eq!(latest.node, "evaluate");
        assert_eq!(latest.state, state("b"));
        assert_eq!(store.list("t1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_thread() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.load_latest("nope").await.unwrap().is_none());
        assert!(store.list("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_non_increasing_seq() {
        let store = InMemoryCheckpointStore::new();
        store
            .save(Checkpoint::new("t1", 3, "plan", state("a")))
            .await
            .unwrap();
        let err = store
            .save(Checkpoint::new("t1", 3, "plan", state("b")))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::OutOfOrder { given: 3, latest: 3, .. }));
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let store = InMemoryCheckpointStore::new();
        store
            .save(Checkpoint::new("alice", 1, "chat", state("a")))
            .await
            .unwrap();
        store
            .save(Checkpoint::new("bob", 1, "chat", state("b")))
            .await
            .unwrap();

        assert_eq!(
            store.load_latest("alice").await.unwrap().unwrap().state,
            state("a")
        );
        assert_eq!(
            store.load_latest("bob").await.unwrap().unwrap().state,
            state("b")
        );
        assert_eq!(store.thread_count().await, 2);

        store.clear().await;
        assert_eq!(store.thread_count().await, 0);
    }
}
