// SPDX-License-Identifier: MIT

//! Ready-made Steps and graphs for common agent patterns
//!
//! - [`chain`] - prompt chaining, one prompt's output feeding the next
//! - [`strategic`] - plan, evaluate, adapt when needed, execute
//! - [`chat`] - chat with long-term memory loaded into the conversation
//! - [`tools`] - tool invocation through the Tool Registry
//! - [`crew`] - sequential hand-off between role-playing agents

pub mod chain;
pub mod chat;
pub mod crew;
pub mod strategic;
pub mod tools;

use serde_json::Value;
use std::sync::Arc;

use crate::adk::error::{GraphError, StepError};
use crate::adk::model::{messages_from_value, messages_to_value, Message};
use crate::workflow::graph::{CompiledGraph, StateGraph};
use crate::workflow::router::END;
use crate::workflow::state::{State, StateSchema};
use crate::workflow::step::Step;

/// Compile steps into a straight line, run in the order given
pub fn linear_graph(
    name: &str,
    schema: StateSchema,
    steps: Vec<(String, Arc<dyn Step>)>,
) -> Result<CompiledGraph, GraphError> {
    let names: Vec<String> = steps.iter().map(|(n, _)| n.clone()).collect();
    let mut graph = StateGraph::new(name).with_schema(schema);
    for (node, step) in steps {
        graph.add_node(node, step);
    }
    for pair in names.windows(2) {
        graph.add_edge(pair[0].clone(), pair[1].as_str());
    }
    if let (Some(first), Some(last)) = (names.first(), names.last()) {
        graph.set_entry_point(first.clone());
        graph.add_edge(last.clone(), END);
    }
    graph.compile()
}

/// Substitute `{field}` placeholders with State values.
///
/// Strings are inserted as-is, other values as JSON. Braces that do not
/// enclose a field name are left alone, so prompts may contain JSON.
pub fn render_template(template: &str, state: &State) -> Result<String, StepError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_placeholder(&after[..close]) => {
                let name = &after[..close];
                let value = state.get_path(name).ok_or_else(|| {
                    StepError::invalid_state(format!("prompt needs missing field '{}'", name))
                })?;
                match value {
                    Value::String(s) => out.push_str(s),
                    other => out.push_str(&other.to_string()),
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Top-level fields a template reads
pub fn template_fields(template: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_placeholder(&after[..close]) => {
                let root = after[..close].split('.').next().unwrap_or_default();
                if !fields.iter().any(|f| f == root) {
                    fields.push(root.to_string());
                }
                rest = &after[close + 1..];
            }
            _ => rest = after,
        }
    }
    fields
}

fn is_placeholder(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !name.starts_with('.')
}

/// The conversation kept in a State field, empty when unset
pub(crate) fn read_messages(state: &State, field: &str) -> Result<Vec<Message>, StepError> {
    match state.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => messages_from_value(value).map_err(|e| {
            StepError::invalid_state(format!("field '{}' is not a message list: {}", field, e))
        }),
    }
}

/// `existing` followed by `new`, as a State value
pub(crate) fn append_messages(existing: Vec<Message>, new: &[Message]) -> Value {
    let mut all = existing;
    all.extend_from_slice(new);
    messages_to_value(&all)
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_template() {
        let state = State::new()
            .with("topic", "Rust")
            .with("n", 3)
            .with("spec", json!({"cpu": "8 cores"}));

        assert_eq!(
            render_template("Write {n} points about {topic}.", &state).unwrap(),
            "Write 3 points about Rust."
        );
        assert_eq!(
            render_template("CPU: {spec.cpu}", &state).unwrap(),
            "CPU: 8 cores"
        );
    }

    #[test]
    fn test_render_leaves_json_braces() {
        let state = State::new().with("topic", "x");
        let out = render_template(r#"Reply as {"score": 1} for {topic}"#, &state).unwrap();
        assert_eq!(out, r#"Reply as {"score": 1} for x"#);
    }

    #[test]
    fn test_render_missing_field() {
        let err = render_template("About {topic}", &State::new()).unwrap_err();
        assert!(matches!(err, StepError::InvalidState(ref m) if m.contains("topic")));
    }

    #[test]
    fn test_template_fields() {
        assert_eq!(
            template_fields(r#"{a} and {b.c} then {a} {"x": 1}"#),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_messages_round_trip_through_state() {
        let state = State::new();
        assert!(read_messages(&state, "messages").unwrap().is_empty());

        let value = append_messages(Vec::new(), &[Message::user("hi")]);
        let state = state.with("messages", value);
        let messages = read_messages(&state, "messages").unwrap();
        assert_eq!(messages, vec![Message::user("hi")]);

        let bad = State::new().with("messages", "nope");
        assert!(read_messages(&bad, "messages").is_err());
    }
}
