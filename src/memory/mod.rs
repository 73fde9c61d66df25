// SPDX-License-Identifier: MIT

//! Memory providers
//!
//! Two independent capabilities:
//! - [`CheckpointStore`] - short-term memory, one resumable state history per thread
//! - [`KnowledgeStore`] - long-term memory, namespaced facts with similarity search

mod checkpoint;
mod file;
mod knowledge;

pub use checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
pub use file::FileCheckpointStore;
pub use knowledge::{
    cosine_similarity, Embedder, InMemoryKnowledgeStore, KnowledgeStore, MemoryRecord, Namespace,
    SearchHit,
};
