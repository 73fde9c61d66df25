// SPDX-License-Identifier: MIT

//! Chat with both kinds of memory
//!
//! Short-term memory is the `messages` field, carried between turns by the
//! Checkpoint Store under the conversation's thread id. Long-term memory
//! lives in the Knowledge Store under `(user_id, "personal_assistant")`:
//! relevant records are loaded before the model is called and the latest
//! exchange is written back afterwards.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{append_messages, read_messages};
use crate::adk::error::{GraphError, StepError};
use crate::adk::model::Message;
use crate::memory::Namespace;
use crate::workflow::graph::{CompiledGraph, StateGraph};
use crate::workflow::router::END;
use crate::workflow::state::{Delta, FieldType, State, StateSchema};
use crate::workflow::step::{Collaborators, Step};

pub const USER_ID: &str = "user_id";
pub const INPUT: &str = "input";
pub const MESSAGES: &str = "messages";
pub const RETRIEVED_MEMORIES: &str = "retrieved_memories";
pub const REPLY: &str = "reply";

/// Namespace context shared by the chat steps
pub const APP_CONTEXT: &str = "personal_assistant";

/// Key the latest exchange is remembered under
pub const LAST_CONVERSATION_KEY: &str = "last_conversation_summary";

pub fn chat_schema() -> StateSchema {
    StateSchema::new()
        .field(USER_ID, FieldType::String)
        .field(INPUT, FieldType::String)
        .field_with_default(MESSAGES, FieldType::Array, json!([]))
        .field_with_default(RETRIEVED_MEMORIES, FieldType::Array, json!([]))
        .field_with_default(REPLY, FieldType::String, json!(""))
}

pub fn user_namespace(user_id: &str) -> Namespace {
    Namespace::new([user_id, APP_CONTEXT])
}

/// Searches long-term memory with the user's input
pub struct LoadMemoryStep {
    limit: usize,
}

impl LoadMemoryStep {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Default for LoadMemoryStep {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl Step for LoadMemoryStep {
    fn reads(&self) -> Vec<String> {
        vec![USER_ID.into(), INPUT.into()]
    }

    fn writes(&self) -> Vec<String> {
        vec![RETRIEVED_MEMORIES.into()]
    }

    async fn execute(&self, state: &State, ctx: &Collaborators) -> Result<Delta, StepError> {
        let user_id = state.require_str(USER_ID)?;
        let input = state.require_str(INPUT)?;
        let hits = ctx
            .knowledge()?
            .search(&user_namespace(user_id), input, self.limit)
            .await?;

        log::info!("Loaded {} memories for user '{}'", hits.len(), user_id);
        let memories: Vec<Value> = hits
            .into_iter()
            .map(|hit| json!({ "key": hit.key, "value": hit.value, "score": hit.score }))
            .collect();
        Ok(Delta::new().set(RETRIEVED_MEMORIES, memories))
    }
}

/// Answers the input with the conversation so far and any loaded memories
pub struct ChatStep {
    system: String,
}

impl ChatStep {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
        }
    }
}

impl Default for ChatStep {
    fn default() -> Self {
        Self::new("You are a helpful assistant.")
    }
}

#[async_trait]
impl Step for ChatStep {
    fn reads(&self) -> Vec<String> {
        vec![INPUT.into(), MESSAGES.into(), RETRIEVED_MEMORIES.into()]
    }

    fn writes(&self) -> Vec<String> {
        vec![MESSAGES.into(), REPLY.into()]
    }

    async fn execute(&self, state: &State, ctx: &Collaborators) -> Result<Delta, StepError> {
        let input = state.require_str(INPUT)?;
        let history = read_messages(state, MESSAGES)?;

        let mut system = self.system.clone();
        let memories = match state.get(RETRIEVED_MEMORIES) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        };
        if !memories.is_empty() {
            system.push_str("\n\nWhat you remember about this user:");
            for memory in memories {
                system.push_str(&format!("\n- {}: {}", memory["key"], memory["value"]));
            }
        }

        let user = Message::user(input);
        let mut conversation = Vec::with_capacity(history.len() + 2);
        conversation.push(Message::system(system));
        conversation.extend(history.iter().cloned());
        conversation.push(user.clone());

        let reply = ctx.model()?.complete(&conversation).await?;
        let content = reply.content.clone();
        Ok(Delta::new()
            .set(MESSAGES, append_messages(history, &[user, reply]))
            .set(REPLY, content))
    }
}

/// Persists the latest exchange as a long-term memory
pub struct RememberStep;

#[async_trait]
impl Step for RememberStep {
    fn reads(&self) -> Vec<String> {
        vec![USER_ID.into(), INPUT.into(), REPLY.into()]
    }

    async fn execute(&self, state: &State, ctx: &Collaborators) -> Result<Delta, StepError> {
        let user_id = state.require_str(USER_ID)?;
        let value = json!({
            "last_message": state.require_str(INPUT)?,
            "last_reply": state.require_str(REPLY)?,
        });
        ctx.knowledge()?
            .put(&user_namespace(user_id), LAST_CONVERSATION_KEY, value)
            .await?;
        Ok(Delta::new())
    }
}

/// load_memory -> chat -> remember
pub fn chat_graph() -> Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new("memory_chat").with_schema(chat_schema());
    graph
        .add_node("load_memory", Arc::new(LoadMemoryStep::default()))
        .add_node("chat", Arc::new(ChatStep::default()))
        .add_node("remember", Arc::new(RememberStep))
        .set_entry_point("load_memory")
        .add_edge("load_memory", "chat")
        .add_edge("chat", "remember")
        .add_edge("remember", END);
    graph.compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::Role;
    use crate::memory::{InMemoryCheckpointStore, InMemoryKnowledgeStore, KnowledgeStore};
    use crate::patterns::mock::MockModel;
    use crate::workflow::graph::InvokeConfig;

    async fn knowledge() -> Arc<InMemoryKnowledgeStore> {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store
            .put(
                &user_namespace("alice"),
                "user_preferences",
                json!({"favorite_coffee": "cappuccino", "allergies": ["peanuts"]}),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_memories_reach_the_prompt() {
        let knowledge = knowledge().await;
        let model = Arc::new(MockModel::new(vec!["A cappuccino, as usual?"]));
        let ctx = Collaborators::new()
            .with_model(model.clone())
            .with_knowledge(knowledge.clone());

        let outcome = chat_graph()
            .unwrap()
            .invoke(
                State::new()
                    .with(USER_ID, "alice")
                    .with(INPUT, "What coffee do I like, given my allergies?"),
                &ctx,
                InvokeConfig::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.visited, vec!["load_memory", "chat", "remember"]);
        assert_eq!(outcome.state.get_str(REPLY), Some("A cappuccino, as usual?"));

        let sent = model.conversation(0);
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0].content.contains("cappuccino"));

        let saved = knowledge
            .get(&user_namespace("alice"), LAST_CONVERSATION_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.value["last_reply"], "A cappuccino, as usual?");
    }

    #[tokio::test]
    async fn test_thread_keeps_history() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let model = Arc::new(MockModel::new(vec!["Hi Alice!", "Your name is Alice."]));
        let ctx = Collaborators::new()
            .with_model(model.clone())
            .with_knowledge(Arc::new(InMemoryKnowledgeStore::new()));
        let graph = chat_graph().unwrap().with_checkpointer(store);

        graph
            .invoke(
                State::new()
                    .with(USER_ID, "alice")
                    .with(INPUT, "Hi! My name is Alice."),
                &ctx,
                InvokeConfig::new().with_thread("conversation-1"),
            )
            .await
            .unwrap();

        let second = graph
            .invoke(
                State::new().with(USER_ID, "alice"),
                &ctx,
                InvokeConfig::new()
                    .with_thread("conversation-1")
                    .with_resume_input(Delta::new().set(INPUT, "What's my name?")),
            )
            .await
            .unwrap();

        assert!(second.resumed);
        assert_eq!(second.state.require_array(MESSAGES).unwrap().len(), 4);
        // system + first exchange + new question
        let sent = model.conversation(1);
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[1].content, "Hi! My name is Alice.");
    }

    #[tokio::test]
    async fn test_chat_without_knowledge_store() {
        let ctx = Collaborators::new().with_model(Arc::new(MockModel::new(vec!["hello"])));
        let err = chat_graph()
            .unwrap()
            .invoke(
                State::new().with(USER_ID, "bob").with(INPUT, "hi"),
                &ctx,
                InvokeConfig::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "MissingCollaborator");
        assert_eq!(err.visited, vec!["load_memory"]);
    }
}
