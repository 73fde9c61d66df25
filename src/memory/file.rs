// SPDX-License-Identifier: MIT

//! JSON-file checkpoint store
//!
//! One file per thread holding its full history. Writes go to a temporary
//! file first and are renamed into place, so a crash mid-write leaves the
//! previous history intact.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use super::checkpoint::{ensure_after, Checkpoint, CheckpointStore};
use crate::adk::error::MemoryError;

pub struct FileCheckpointStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    /// Open (and create if needed) a checkpoint directory
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn thread_path(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(thread_id)))
    }

    async fn read_history(&self, thread_id: &str) -> Result<Vec<Checkpoint>, MemoryError> {
        let path = self.thread_path(thread_id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Map a thread id onto a safe file name, keeping it readable
fn file_stem(thread_id: &str) -> String {
    thread_id
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || b == b'-' {
                (b as char).to_string()
            } else {
                format!("_{:02x}", b)
            }
        })
        .collect()
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), MemoryError> {
        let _guard = self.write_lock.lock().await;
        let mut history = self.read_history(&checkpoint.thread_id).await?;
        ensure_after(history.last(), &checkpoint)?;

        let path = self.thread_path(&checkpoint.thread_id);
        log::debug!(
            "Writing checkpoint {} for thread '{}' to {}",
            checkpoint.seq,
            checkpoint.thread_id,
            path.display()
        );
        history.push(checkpoint);

        let bytes = serde_json::to_vec_pretty(&history)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, MemoryError> {
        Ok(self.read_history(thread_id).await?.pop())
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, MemoryError> {
        self.read_history(thread_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::state::State;

    #[test]
    fn test_file_stem_escapes() {
        assert_eq!(file_stem("conversation-1"), "conversation-1");
        assert_eq!(file_stem("a/b"), "a_2fb");
        assert_eq!(file_stem("a_b"), "a_5fb");
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileCheckpointStore::open(dir.path()).await.unwrap();
            store
                .save(Checkpoint::new("t1", 1, "plan", State::new().with("plan", "p")))
                .await
                .unwrap();
            store
                .save(Checkpoint::new("t1", 2, "evaluate", State::new().with("score", 5)))
                .await
                .unwrap();
        }

        let reopened = FileCheckpointStore::open(dir.path()).await.unwrap();
        let latest = reopened.load_latest("t1").await.unwrap().unwrap();
        assert_eq!(latest.seq, 2);
        assert_eq!(latest.node, "evaluate");
        assert_eq!(reopened.list("t1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_thread() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        assert!(store.load_latest("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_out_of_order_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        store
            .save(Checkpoint::new("t", 5, "a", State::new()))
            .await
            .unwrap();
        assert!(store
            .save(Checkpoint::new("t", 4, "b", State::new()))
            .await
            .is_err());
        assert_eq!(store.list("t").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        fs::write(store.thread_path("bad"), b"{not json").await.unwrap();
        assert!(matches!(
            store.load_latest("bad").await,
            Err(MemoryError::Json(_))
        ));
    }
}
