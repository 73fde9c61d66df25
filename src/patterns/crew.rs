// SPDX-License-Identifier: MIT

//! Sequential multi-agent collaboration
//!
//! Each [`RoleStep`] is an agent with a role, a goal and a task. Outputs of
//! earlier agents are handed to later ones as context.

use async_trait::async_trait;
use std::sync::Arc;

use super::linear_graph;
use crate::adk::error::{GraphError, StepError};
use crate::adk::model::Message;
use crate::workflow::graph::CompiledGraph;
use crate::workflow::state::{Delta, FieldType, State, StateSchema};
use crate::workflow::step::{Collaborators, Step};

/// An agent persona bound to one task
#[derive(Debug, Clone)]
pub struct RoleStep {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub task: String,
    pub expected_output: String,
    /// Fields written by earlier agents that this one should read
    pub context: Vec<String>,
    pub output: String,
}

impl RoleStep {
    fn system_prompt(&self) -> String {
        format!(
            "You are a {}. {}\nYour goal: {}",
            self.role, self.backstory, self.goal
        )
    }

    fn task_prompt(&self, state: &State) -> Result<String, StepError> {
        let mut prompt = format!(
            "Task: {}\n\nExpected output: {}",
            self.task, self.expected_output
        );
        for field in &self.context {
            let text = state.require_str(field)?;
            prompt.push_str(&format!("\n\nContext from {}:\n{}", field, text));
        }
        Ok(prompt)
    }
}

#[async_trait]
impl Step for RoleStep {
    fn reads(&self) -> Vec<String> {
        self.context.clone()
    }

    fn writes(&self) -> Vec<String> {
        vec![self.output.clone()]
    }

    async fn execute(&self, state: &State, ctx: &Collaborators) -> Result<Delta, StepError> {
        log::info!("Agent '{}' starting task", self.role);
        let conversation = [
            Message::system(self.system_prompt()),
            Message::user(self.task_prompt(state)?),
        ];
        let reply = ctx.model()?.complete(&conversation).await?;
        Ok(Delta::new().set(self.output.clone(), reply.content))
    }
}

/// Run agents one after another in the given order
pub fn crew_graph(
    name: &str,
    agents: Vec<(String, RoleStep)>,
) -> Result<CompiledGraph, GraphError> {
    let mut schema = StateSchema::new();
    for (_, agent) in &agents {
        schema = schema.field(agent.output.clone(), FieldType::String);
    }

    let agents = agents
        .into_iter()
        .map(|(node, agent)| (node, Arc::new(agent) as Arc<dyn Step>))
        .collect();
    linear_graph(name, schema, agents)
}

/// Researcher finds AI trends, writer turns them into a blog post
pub fn blog_crew() -> Result<CompiledGraph, GraphError> {
    let researcher = RoleStep {
        role: "Senior Research Analyst".into(),
        goal: "Find and summarize the latest trends in AI.".into(),
        backstory: "You are an experienced research analyst with a knack for identifying \
                    key trends and synthesizing information."
            .into(),
        task: "Research the top 3 emerging trends in Artificial Intelligence in 2024-2025. \
               Focus on practical applications and potential impact."
            .into(),
        expected_output: "A detailed summary of the top 3 AI trends, including key points \
                          and sources."
            .into(),
        context: vec![],
        output: "research".into(),
    };
    let writer = RoleStep {
        role: "Technical Content Writer".into(),
        goal: "Write a clear and engaging blog post based on research findings.".into(),
        backstory: "You are a skilled writer who can translate complex technical topics \
                    into accessible content."
            .into(),
        task: "Write a 500-word blog post based on the research findings. The post should \
               be engaging and easy for a general audience to understand."
            .into(),
        expected_output: "A complete 500-word blog post about the latest AI trends.".into(),
        context: vec!["research".into()],
        output: "blog_post".into(),
    };

    crew_graph(
        "blog_crew",
        vec![("research".into(), researcher), ("write".into(), writer)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::mock::MockModel;
    use crate::workflow::graph::InvokeConfig;

    #[tokio::test]
    async fn test_writer_sees_research() {
        let model = Arc::new(MockModel::new(vec![
            "1. agents 2. small models 3. robotics",
            "Blog!",
        ]));
        let ctx = Collaborators::new().with_model(model.clone());

        let outcome = blog_crew()
            .unwrap()
            .invoke(State::new(), &ctx, InvokeConfig::new())
            .await
            .unwrap();

        assert_eq!(outcome.visited, vec!["research", "write"]);
        assert_eq!(outcome.state.get_str("blog_post"), Some("Blog!"));

        let writer_call = model.conversation(1);
        assert!(writer_call[0].content.contains("Technical Content Writer"));
        assert!(writer_call[1].content.contains("small models"));
    }

    #[test]
    fn test_crew_context_must_be_in_schema() {
        let lonely = RoleStep {
            role: "r".into(),
            goal: "g".into(),
            backstory: "b".into(),
            task: "t".into(),
            expected_output: "o".into(),
            context: vec!["missing".into()],
            output: "out".into(),
        };
        let err = crew_graph("c", vec![("solo".into(), lonely)]).err().unwrap();
        assert!(err.to_string().contains("missing"));
    }
}
