// SPDX-License-Identifier: MIT

//! Tool use through the Tool Registry
//!
//! [`ToolStep`] builds tool arguments from State fields, invokes the tool
//! and stores the result. Tool failures either fail the run or, when an
//! error field is configured, land in State for a later node to explain.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::chain::PromptStep;
use crate::adk::error::{GraphError, StepError};
use crate::adk::tool::FnTool;
use crate::workflow::graph::{CompiledGraph, StateGraph};
use crate::workflow::router::END;
use crate::workflow::state::{Delta, FieldType, State, StateSchema};
use crate::workflow::step::{Collaborators, Step};

pub const SEARCH_TOOL: &str = "search_information";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// What to look up, e.g. "capital of France"
    pub query: String,
}

/// Canned lookup standing in for a real search backend
fn simulated_search(args: SearchArgs) -> Result<Value, String> {
    let answer = match args.query.trim().to_lowercase().as_str() {
        "weather in london" => {
            "The weather in London is currently cloudy with a temperature of 15°C.".to_string()
        }
        "capital of france" => "The capital of France is Paris.".to_string(),
        "population of earth" => {
            "The estimated population of Earth is around 8 billion people.".to_string()
        }
        "tallest mountain" => "Mount Everest is the tallest mountain above sea level.".to_string(),
        _ => format!(
            "Simulated search result for '{}': No specific information found, \
             but the topic seems interesting.",
            args.query
        ),
    };
    Ok(Value::String(answer))
}

/// `search_information`: factual answers for a handful of known queries
pub fn search_information_tool() -> FnTool<SearchArgs> {
    FnTool::new(
        SEARCH_TOOL,
        "Provides factual information on a given topic. Use this tool to find answers \
         to phrases like 'capital of France' or 'weather in London?'.",
        simulated_search,
    )
}

/// Invoke one tool with arguments taken from State
pub struct ToolStep {
    tool: String,
    args: Vec<(String, String)>,
    output: String,
    error_field: Option<String>,
}

impl ToolStep {
    pub fn new(tool: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            args: Vec::new(),
            output: output.into(),
            error_field: None,
        }
    }

    /// Pass State field `field` as tool argument `name`
    pub fn arg(mut self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.args.push((name.into(), field.into()));
        self
    }

    /// Write tool failures to `field` instead of failing the run
    pub fn fold_errors_into(mut self, field: impl Into<String>) -> Self {
        self.error_field = Some(field.into());
        self
    }
}

#[async_trait]
impl Step for ToolStep {
    fn reads(&self) -> Vec<String> {
        self.args.iter().map(|(_, field)| field.clone()).collect()
    }

    fn writes(&self) -> Vec<String> {
        let mut fields = vec![self.output.clone()];
        fields.extend(self.error_field.clone());
        fields
    }

    async fn execute(&self, state: &State, ctx: &Collaborators) -> Result<Delta, StepError> {
        let mut args = Map::new();
        for (name, field) in &self.args {
            args.insert(name.clone(), state.require(field)?.clone());
        }

        match ctx.tools().invoke(&self.tool, Value::Object(args)).await {
            Ok(result) => {
                let mut delta = Delta::new().set(self.output.clone(), result);
                if let Some(field) = &self.error_field {
                    delta.insert(field.clone(), Value::Null);
                }
                Ok(delta)
            }
            Err(e) => match &self.error_field {
                Some(field) => {
                    log::warn!("Tool '{}' failed, recording error: {}", self.tool, e);
                    Ok(Delta::new()
                        .set(self.output.clone(), Value::Null)
                        .set(field.clone(), e.to_string()))
                }
                None => Err(e.into()),
            },
        }
    }
}

/// lookup (search tool) -> answer (model), errors folded into `tool_error`
pub fn tool_answer_graph() -> Result<CompiledGraph, GraphError> {
    let schema = StateSchema::new()
        .field("question", FieldType::String)
        .field("query", FieldType::String)
        .field("search_result", FieldType::Any)
        .field_with_default("tool_error", FieldType::String, json!(null))
        .field("answer", FieldType::String);

    let lookup = ToolStep::new(SEARCH_TOOL, "search_result")
        .arg("query", "query")
        .fold_errors_into("tool_error");
    let answer = PromptStep::new(
        "Answer the question using the search result. If the lookup failed, say so.\n\n\
         Question: {question}\nSearch result: {search_result}\nLookup error: {tool_error}",
        "answer",
    );

    let mut graph = StateGraph::new("tool_use").with_schema(schema);
    graph
        .add_node("lookup", Arc::new(lookup))
        .add_node("answer", Arc::new(answer))
        .set_entry_point("lookup")
        .add_edge("lookup", "answer")
        .add_edge("answer", END);
    graph.compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::tool::Tool;
    use crate::patterns::mock::MockModel;
    use crate::workflow::graph::InvokeConfig;
    use crate::workflow::registry::ToolRegistry;

    async fn registry() -> ToolRegistry {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(search_information_tool())).await;
        registry
    }

    #[tokio::test]
    async fn test_search_tool() {
        let tool = search_information_tool();
        assert_eq!(tool.name(), SEARCH_TOOL);
        assert!(tool.schema()["properties"]["query"].is_object());

        let out = tool.execute(json!({"query": "Capital of France"})).await.unwrap();
        assert_eq!(out, json!("The capital of France is Paris."));

        let out = tool.execute(json!({"query": "dogs"})).await.unwrap();
        assert!(out.as_str().unwrap().contains("'dogs'"));

        assert!(tool.execute(json!({"q": "x"})).await.is_err());
    }

    #[tokio::test]
    async fn test_tool_step_writes_result() {
        let ctx = Collaborators::new().with_tools(registry().await);
        let step = ToolStep::new(SEARCH_TOOL, "result").arg("query", "q");

        let delta = step
            .execute(&State::new().with("q", "tallest mountain"), &ctx)
            .await
            .unwrap();
        assert_eq!(
            delta.get("result"),
            Some(&json!("Mount Everest is the tallest mountain above sea level."))
        );
        assert_eq!(step.reads(), vec!["q"]);
    }

    #[tokio::test]
    async fn test_missing_tool_fails_or_folds() {
        let ctx = Collaborators::new();
        let state = State::new().with("q", "x");

        let strict = ToolStep::new("nope", "result").arg("query", "q");
        let err = strict.execute(&state, &ctx).await.unwrap_err();
        assert!(matches!(err, StepError::Tool(_)));

        let lenient = ToolStep::new("nope", "result")
            .arg("query", "q")
            .fold_errors_into("error");
        let delta = lenient.execute(&state, &ctx).await.unwrap();
        assert_eq!(delta.get("result"), Some(&Value::Null));
        assert!(delta.get("error").unwrap().as_str().unwrap().contains("not found"));
        assert_eq!(lenient.writes(), vec!["result", "error"]);
    }

    #[tokio::test]
    async fn test_tool_answer_graph() {
        let model = Arc::new(MockModel::new(vec!["Paris."]));
        let ctx = Collaborators::new()
            .with_model(model.clone())
            .with_tools(registry().await);

        let outcome = tool_answer_graph()
            .unwrap()
            .invoke(
                State::new()
                    .with("question", "What is the capital of France?")
                    .with("query", "capital of france"),
                &ctx,
                InvokeConfig::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.visited, vec!["lookup", "answer"]);
        assert_eq!(outcome.state.get_str("answer"), Some("Paris."));
        assert!(model.conversation(0)[0]
            .content
            .contains("The capital of France is Paris."));
    }
}
