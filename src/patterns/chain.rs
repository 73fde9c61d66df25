// SPDX-License-Identifier: MIT

//! Prompt chaining
//!
//! Each [`PromptStep`] renders a template from State, asks the model once
//! and stores the reply in one field, which later prompts can reference.

use async_trait::async_trait;
use std::sync::Arc;

use super::{linear_graph, render_template, template_fields};
use crate::adk::error::{GraphError, StepError};
use crate::adk::model::Message;
use crate::workflow::graph::CompiledGraph;
use crate::workflow::state::{Delta, FieldType, State, StateSchema};
use crate::workflow::step::{Collaborators, Step};

/// One model call: template in, reply text out
pub struct PromptStep {
    system: Option<String>,
    template: String,
    output: String,
}

impl PromptStep {
    pub fn new(template: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            system: None,
            template: template.into(),
            output: output.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn output(&self) -> &str {
        &self.output
    }
}

#[async_trait]
impl Step for PromptStep {
    fn reads(&self) -> Vec<String> {
        let mut fields = template_fields(&self.template);
        if let Some(system) = &self.system {
            for field in template_fields(system) {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
        fields
    }

    fn writes(&self) -> Vec<String> {
        vec![self.output.clone()]
    }

    async fn execute(&self, state: &State, ctx: &Collaborators) -> Result<Delta, StepError> {
        let model = ctx.model()?;
        let mut conversation = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            conversation.push(Message::system(render_template(system, state)?));
        }
        conversation.push(Message::user(render_template(&self.template, state)?));

        let reply = model.complete(&conversation).await?;
        log::debug!("Prompt step wrote {} chars to '{}'", reply.content.len(), self.output);
        Ok(Delta::new().set(self.output.clone(), reply.content))
    }
}

/// Compile a linear chain of prompt steps, run in the order given.
///
/// `input` names the field the first prompt starts from. The schema is
/// built from the chain: the input plus every step's output, all strings.
pub fn chain_graph(
    name: &str,
    input: &str,
    steps: Vec<(String, PromptStep)>,
) -> Result<CompiledGraph, GraphError> {
    let mut schema = StateSchema::new().field(input, FieldType::String);
    for (_, step) in &steps {
        schema = schema.field(step.output(), FieldType::String);
    }

    let steps = steps
        .into_iter()
        .map(|(node, step)| (node, Arc::new(step) as Arc<dyn Step>))
        .collect();
    linear_graph(name, schema, steps)
}

/// Two-link chain: pull specs out of free text, then reshape them as JSON
pub fn spec_extraction_graph() -> Result<CompiledGraph, GraphError> {
    chain_graph(
        "spec_extraction",
        "text_input",
        vec![
            (
                "extract".to_string(),
                PromptStep::new(
                    "Extract the technical specifications from the following text:\n\n{text_input}",
                    "specifications",
                ),
            ),
            (
                "transform".to_string(),
                PromptStep::new(
                    "Transform the following specifications into a JSON object with 'cpu', \
                     'memory', and 'storage' as keys:\n\n{specifications}",
                    "result",
                ),
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::Role;
    use crate::patterns::mock::MockModel;
    use crate::workflow::graph::InvokeConfig;
    use serde_json::json;

    #[test]
    fn test_prompt_step_declarations() {
        let step = PromptStep::new("Summarise {text} for {audience}", "summary")
            .with_system("You write for {audience} in {tone}");
        assert_eq!(step.reads(), vec!["text", "audience", "tone"]);
        assert_eq!(step.writes(), vec!["summary"]);
    }

    #[tokio::test]
    async fn test_prompt_step_needs_model() {
        let step = PromptStep::new("{text}", "out");
        let err = step
            .execute(&State::new().with("text", "x"), &Collaborators::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::MissingCollaborator(_)));
    }

    #[tokio::test]
    async fn test_spec_extraction_chain() {
        let model = Arc::new(MockModel::new(vec![
            "CPU: 3.5 GHz octa-core; RAM: 16GB; Storage: 1TB NVMe",
            r#"{"cpu": "3.5 GHz octa-core", "memory": "16GB", "storage": "1TB NVMe"}"#,
        ]));
        let ctx = Collaborators::new().with_model(model.clone());
        let graph = spec_extraction_graph().unwrap();

        let outcome = graph
            .invoke(
                State::new().with(
                    "text_input",
                    "The new laptop has a 3.5 GHz octa-core processor, 16GB of RAM and a 1TB NVMe SSD.",
                ),
                &ctx,
                InvokeConfig::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.visited, vec!["extract", "transform"]);
        assert_eq!(
            outcome.state.get("specifications"),
            Some(&json!("CPU: 3.5 GHz octa-core; RAM: 16GB; Storage: 1TB NVMe"))
        );
        assert!(outcome.state.get_str("result").unwrap().contains("\"cpu\""));

        // the second prompt carries the first reply
        let second = model.conversation(1);
        assert_eq!(second[0].role, Role::User);
        assert!(second[0].content.contains("RAM: 16GB"));
    }

    #[test]
    fn test_empty_chain_does_not_compile() {
        assert!(chain_graph("empty", "text", vec![]).is_err());
    }
}
