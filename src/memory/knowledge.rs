// SPDX-License-Identifier: MIT

//! Knowledge Store: long-term, namespaced key/value memory
//!
//! A namespace is a tuple of identifiers such as `("user_bob", "assistant")`
//! that partitions records into independent folders. Within a namespace a
//! key is unique and writes are last-writer-wins. Records never expire.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::adk::error::MemoryError;

/// Ordered tuple of identifiers scoping a set of records
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(Vec<String>);

impl Namespace {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// One stored fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub namespace: Namespace,
    pub key: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub key: String,
    pub value: Value,
    pub score: f32,
}

/// Turns text into vectors for similarity search.
///
/// Embedding generation is owned by the caller; this is only the seam.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError>;
}

/// Namespaced long-term memory
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Insert or overwrite `(namespace, key)`
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<(), MemoryError>;

    async fn get(&self, namespace: &Namespace, key: &str)
        -> Result<Option<MemoryRecord>, MemoryError>;

    /// Returns whether a record was removed
    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<bool, MemoryError>;

    /// All records in a namespace ordered by key
    async fn list(&self, namespace: &Namespace) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// At most `limit` hits, best first, ties broken by key.
    ///
    /// The result is a finished list; issue another search for fresh results.
    async fn search(
        &self,
        namespace: &Namespace,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, MemoryError>;
}

/// Process-local knowledge store.
///
/// With an [`Embedder`] attached, search ranks by cosine similarity of
/// embeddings. Without one it falls back to the fraction of query terms
/// found in the record's key and value.
#[derive(Clone, Default)]
pub struct InMemoryKnowledgeStore {
    records: Arc<RwLock<HashMap<Namespace, BTreeMap<String, MemoryRecord>>>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    async fn embed_one(&self, text: String) -> Result<Option<Vec<f32>>, MemoryError> {
        match &self.embedder {
            None => Ok(None),
            Some(embedder) => {
                let mut vectors = embedder.embed(&[text]).await?;
                vectors
                    .pop()
                    .map(Some)
                    .ok_or_else(|| MemoryError::Backend("embedder returned no vector".into()))
            }
        }
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<(), MemoryError> {
        // Embed before taking the lock; the embedder may be slow
        let embedding = self.embed_one(record_text(key, &value)).await?;
        let now = Utc::now();

        let mut records = self.records.write().await;
        let folder = records.entry(namespace.clone()).or_default();
        let created_at = folder.get(key).map(|r| r.created_at).unwrap_or(now);
        folder.insert(
            key.to_string(),
            MemoryRecord {
                namespace: namespace.clone(),
                key: key.to_string(),
                value,
                embedding,
                created_at,
                updated_at: now,
            },
        );
        log::debug!("Stored memory {}:{}", namespace, key);
        Ok(())
    }

    async fn get(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        let records = self.records.read().await;
        Ok(records.get(namespace).and_then(|f| f.get(key)).cloned())
    }

    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<bool, MemoryError> {
        let mut records = self.records.write().await;
        Ok(records
            .get_mut(namespace)
            .map(|f| f.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn list(&self, namespace: &Namespace) -> Result<Vec<MemoryRecord>, MemoryError> {
        let records = self.records.read().await;
        Ok(records
            .get(namespace)
            .map(|f| f.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn search(
        &self,
        namespace: &Namespace,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, MemoryError> {
        let query_vector = if query.trim().is_empty() {
            None
        } else {
            self.embed_one(query.to_string()).await?
        };
        let query_terms = terms(query);

        let records = self.records.read().await;
        let Some(folder) = records.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchHit> = folder
            .values()
            .filter_map(|record| {
                let score = if query_terms.is_empty() {
                    // Empty query lists the namespace
                    0.0
                } else {
                    match (&query_vector, &record.embedding) {
                        (Some(q), Some(e)) => cosine_similarity(q, e),
                        _ => {
                            let s = term_overlap(&query_terms, &record.key, &record.value);
                            if s <= 0.0 {
                                return None;
                            }
                            s
                        }
                    }
                };
                Some(SearchHit {
                    key: record.key.clone(),
                    value: record.value.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Cosine similarity, 0 for mismatched or zero-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Key plus every string, number, bool and object key in the value
fn record_text(key: &str, value: &Value) -> String {
    fn walk(value: &Value, out: &mut String) {
        match value {
            Value::Null => {}
            Value::String(s) => {
                out.push(' ');
                out.push_str(s);
            }
            Value::Number(_) | Value::Bool(_) => {
                out.push(' ');
                out.push_str(&value.to_string());
            }
            Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            Value::Object(map) => {
                for (k, v) in map {
                    out.push(' ');
                    out.push_str(k);
                    walk(v, out);
                }
            }
        }
    }

    let mut out = key.to_string();
    walk(value, &mut out);
    out
}

fn term_overlap(query_terms: &BTreeSet<String>, key: &str, value: &Value) -> f32 {
    let record_terms = terms(&record_text(key, value));
    let matched = query_terms.intersection(&record_terms).count();
    matched as f32 / query_terms.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ns() -> Namespace {
        Namespace::new(["user_alice", "personal_assistant"])
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let store = InMemoryKnowledgeStore::new();
        store.put(&ns(), "k", json!("v1")).await.unwrap();
        let first = store.get(&ns(), "k").await.unwrap().unwrap();
        store.put(&ns(), "k", json!("v2")).await.unwrap();

        let record = store.get(&ns(), "k").await.unwrap().unwrap();
        assert_eq!(record.value, json!("v2"));
        assert_eq!(record.created_at, first.created_at);
        assert!(record.updated_at >= first.updated_at);
        assert_eq!(store.list(&ns()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_namespaces_are_independent() {
        let store = InMemoryKnowledgeStore::new();
        let other = Namespace::new(["user_bob", "personal_assistant"]);
        store.put(&ns(), "prefs", json!({"coffee": "cappuccino"})).await.unwrap();

        assert!(store.get(&other, "prefs").await.unwrap().is_none());
        assert!(store.list(&other).await.unwrap().is_empty());
        assert!(store.search(&other, "coffee", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryKnowledgeStore::new();
        store.put(&ns(), "k", json!(1)).await.unwrap();
        assert!(store.delete(&ns(), "k").await.unwrap());
        assert!(!store.delete(&ns(), "k").await.unwrap());
        assert!(store.get(&ns(), "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lexical_search_ranks_by_overlap() {
        let store = InMemoryKnowledgeStore::new();
        store
            .put(
                &ns(),
                "user_preferences",
                json!({"favorite_coffee": "cappuccino", "allergies": ["peanuts"]}),
            )
            .await
            .unwrap();
        store
            .put(
                &ns(),
                "last_conversation_summary",
                json!({"topic": "Travel planning", "key_points": ["vegetarian food"]}),
            )
            .await
            .unwrap();
        store
            .put(&ns(), "agent_instructions", json!({"response_style": "concise"}))
            .await
            .unwrap();

        let hits = store
            .search(&ns(), "food preferences and allergies", 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].key, "user_preferences");
        assert_eq!(hits[1].key, "last_conversation_summary");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_search_limit_and_empty_query() {
        let store = InMemoryKnowledgeStore::new();
        for key in ["a", "b", "c"] {
            store.put(&ns(), key, json!("x")).await.unwrap();
        }
        let hits = store.search(&ns(), "", 2).await.unwrap();
        assert_eq!(
            hits.iter().map(|h| h.key.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        t.matches("coffee").count() as f32,
                        t.matches("travel").count() as f32,
                    ]
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_embedding_search() {
        let store = InMemoryKnowledgeStore::new().with_embedder(Arc::new(AxisEmbedder));
        store.put(&ns(), "drinks", json!("coffee every morning")).await.unwrap();
        store.put(&ns(), "trips", json!("travel to Paris")).await.unwrap();

        let record = store.get(&ns(), "drinks").await.unwrap().unwrap();
        assert!(record.embedding.is_some());

        let hits = store.search(&ns(), "coffee", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].key, "drinks");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].score, 0.0);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_namespace_display() {
        assert_eq!(ns().to_string(), "(user_alice, personal_assistant)");
        assert_eq!(ns().parts().len(), 2);
    }
}
