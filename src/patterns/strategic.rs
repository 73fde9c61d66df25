// SPDX-License-Identifier: MIT

//! Strategic executor: plan, evaluate, adapt when needed, execute
//!
//! ```text
//! plan -> evaluate -+-(adaptation_needed)-> adapt -> execute -> END
//!                   +-----------------------------> execute
//! ```
//!
//! Whether a plan needs work is decided by a [`PlanAssessor`] that yields a
//! typed score. The router only reads the resulting `adaptation_needed`
//! flag, never model text.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{append_messages, read_messages};
use crate::adk::error::{GraphError, ModelError, StepError};
use crate::adk::model::Message;
use crate::workflow::graph::{CompiledGraph, StateGraph};
use crate::workflow::router::{RuleRouter, END};
use crate::workflow::state::{Delta, FieldType, State, StateSchema};
use crate::workflow::step::{Collaborators, Step};

pub const TOPIC: &str = "topic";
pub const PLAN: &str = "plan";
pub const EVALUATION: &str = "evaluation";
pub const PLAN_QUALITY_SCORE: &str = "plan_quality_score";
pub const ADAPTATION_NEEDED: &str = "adaptation_needed";
pub const ADAPTED_PLAN: &str = "adapted_plan";
pub const FINAL_RESULT: &str = "final_result";
pub const MESSAGES: &str = "messages";

/// Plans scoring below this are adapted before execution
pub const DEFAULT_THRESHOLD: i64 = 6;

pub fn strategic_schema() -> StateSchema {
    StateSchema::new()
        .field(TOPIC, FieldType::String)
        .field_with_default(PLAN, FieldType::String, json!(""))
        .field_with_default(EVALUATION, FieldType::String, json!(""))
        .field_with_default(PLAN_QUALITY_SCORE, FieldType::Integer, json!(0))
        .field_with_default(ADAPTATION_NEEDED, FieldType::Boolean, json!(false))
        .field_with_default(ADAPTED_PLAN, FieldType::String, json!(""))
        .field_with_default(FINAL_RESULT, FieldType::String, json!(""))
        .field_with_default(MESSAGES, FieldType::Array, json!([]))
}

/// A plan's quality on a 1-10 scale
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Assessment {
    pub score: i64,
    #[serde(default)]
    pub rationale: String,
}

/// Decides how good a plan is
#[async_trait]
pub trait PlanAssessor: Send + Sync {
    async fn assess(
        &self,
        topic: &str,
        plan: &str,
        ctx: &Collaborators,
    ) -> Result<Assessment, StepError>;
}

/// Asks the model for a JSON verdict `{"score": n, "rationale": "..."}`
#[derive(Default)]
pub struct ModelAssessor;

impl ModelAssessor {
    pub fn new() -> Self {
        Self
    }
}

/// Pull the first `{...}` object out of a reply and read it as an assessment
fn parse_assessment(reply: &str) -> Result<Assessment, ModelError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => {
            return Err(ModelError::InvalidResponse(
                "assessment reply holds no JSON object".to_string(),
            ))
        }
    };
    let mut assessment: Assessment = serde_json::from_str(json)
        .map_err(|e| ModelError::InvalidResponse(format!("bad assessment JSON: {}", e)))?;
    assessment.score = assessment.score.clamp(1, 10);
    Ok(assessment)
}

#[async_trait]
impl PlanAssessor for ModelAssessor {
    async fn assess(
        &self,
        topic: &str,
        plan: &str,
        ctx: &Collaborators,
    ) -> Result<Assessment, StepError> {
        let prompt = format!(
            "Evaluate this plan for writing about '{}':\n\n{}\n\n\
             Rate the plan quality from 1 to 10. Consider completeness, clarity, \
             structure and feasibility. Reply with only a JSON object: \
             {{\"score\": <1-10>, \"rationale\": \"<one sentence>\"}}",
            topic, plan
        );
        let conversation = [
            Message::system("You are a strict reviewer of content plans."),
            Message::user(prompt),
        ];
        let reply = ctx.model()?.complete(&conversation).await?;
        Ok(parse_assessment(&reply.content)?)
    }
}

/// Always returns the same score; for tests and forced runs
pub struct FixedAssessor {
    score: i64,
}

impl FixedAssessor {
    pub fn new(score: i64) -> Self {
        Self { score }
    }
}

#[async_trait]
impl PlanAssessor for FixedAssessor {
    async fn assess(
        &self,
        _topic: &str,
        _plan: &str,
        _ctx: &Collaborators,
    ) -> Result<Assessment, StepError> {
        Ok(Assessment {
            score: self.score,
            rationale: format!("fixed score {}", self.score),
        })
    }
}

/// Run the model on one user prompt, keeping the running transcript
async fn converse(
    state: &State,
    ctx: &Collaborators,
    system: Option<&str>,
    prompt: String,
) -> Result<(String, serde_json::Value), StepError> {
    let history = read_messages(state, MESSAGES)?;
    let mut turn = Vec::with_capacity(3);
    if let Some(system) = system {
        turn.push(Message::system(system));
    }
    turn.push(Message::user(prompt));

    let mut conversation = history.clone();
    conversation.extend(turn.iter().cloned());
    let reply = ctx.model()?.complete(&conversation).await?;

    turn.push(reply.clone());
    Ok((reply.content, append_messages(history, &turn)))
}

pub struct PlanStep;

#[async_trait]
impl Step for PlanStep {
    fn reads(&self) -> Vec<String> {
        vec![TOPIC.into(), MESSAGES.into()]
    }

    fn writes(&self) -> Vec<String> {
        vec![PLAN.into(), ADAPTED_PLAN.into(), MESSAGES.into()]
    }

    async fn execute(&self, state: &State, ctx: &Collaborators) -> Result<Delta, StepError> {
        let topic = state.require_str(TOPIC)?;
        let prompt = format!(
            "Create a strategic plan for writing about: '{}'\n\n\
             Your plan should include:\n\
             - Key points to cover\n\
             - Structure/order\n\
             - Target length considerations\n\n\
             Output a clear, actionable plan.",
            topic
        );
        let (plan, messages) = converse(
            state,
            ctx,
            Some("You are a strategic content planner."),
            prompt,
        )
        .await?;
        // a fresh plan supersedes any adaptation from an earlier run
        Ok(Delta::new()
            .set(PLAN, plan)
            .set(ADAPTED_PLAN, "")
            .set(MESSAGES, messages))
    }
}

/// Scores the plan and raises `adaptation_needed` below the threshold
pub struct EvaluateStep {
    assessor: Arc<dyn PlanAssessor>,
    threshold: i64,
}

impl EvaluateStep {
    pub fn new(assessor: Arc<dyn PlanAssessor>) -> Self {
        Self {
            assessor,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: i64) -> Self {
        self.threshold = threshold;
        self
    }
}

#[async_trait]
impl Step for EvaluateStep {
    fn reads(&self) -> Vec<String> {
        vec![TOPIC.into(), PLAN.into()]
    }

    fn writes(&self) -> Vec<String> {
        vec![
            EVALUATION.into(),
            PLAN_QUALITY_SCORE.into(),
            ADAPTATION_NEEDED.into(),
        ]
    }

    async fn execute(&self, state: &State, ctx: &Collaborators) -> Result<Delta, StepError> {
        let topic = state.require_str(TOPIC)?;
        let plan = state.require_str(PLAN)?;
        let assessment = self.assessor.assess(topic, plan, ctx).await?;
        let needs_adaptation = assessment.score < self.threshold;

        log::info!(
            "Plan scored {}/10, adaptation needed: {}",
            assessment.score,
            needs_adaptation
        );
        Ok(Delta::new()
            .set(EVALUATION, assessment.rationale)
            .set(PLAN_QUALITY_SCORE, assessment.score)
            .set(ADAPTATION_NEEDED, needs_adaptation))
    }
}

pub struct AdaptStep;

#[async_trait]
impl Step for AdaptStep {
    fn reads(&self) -> Vec<String> {
        vec![TOPIC.into(), PLAN.into(), EVALUATION.into(), MESSAGES.into()]
    }

    fn writes(&self) -> Vec<String> {
        vec![ADAPTED_PLAN.into(), MESSAGES.into()]
    }

    async fn execute(&self, state: &State, ctx: &Collaborators) -> Result<Delta, StepError> {
        let topic = state.require_str(TOPIC)?;
        let plan = state.require_str(PLAN)?;
        let mut prompt = format!(
            "Improve this plan for '{}':\n\nCurrent Plan:\n{}\n\n",
            topic, plan
        );
        if let Some(feedback) = state.get_str(EVALUATION) {
            prompt.push_str(&format!("Reviewer feedback: {}\n\n", feedback));
        }
        prompt.push_str("Create a refined, improved version that addresses gaps and weaknesses.");

        let (adapted, messages) = converse(state, ctx, None, prompt).await?;
        Ok(Delta::new()
            .set(ADAPTED_PLAN, adapted)
            .set(MESSAGES, messages))
    }
}

pub struct ExecuteStep;

#[async_trait]
impl Step for ExecuteStep {
    fn reads(&self) -> Vec<String> {
        vec![TOPIC.into(), PLAN.into(), ADAPTED_PLAN.into(), MESSAGES.into()]
    }

    fn writes(&self) -> Vec<String> {
        vec![FINAL_RESULT.into(), MESSAGES.into()]
    }

    async fn execute(&self, state: &State, ctx: &Collaborators) -> Result<Delta, StepError> {
        let topic = state.require_str(TOPIC)?;
        let plan = match state.get_str(ADAPTED_PLAN) {
            Some(adapted) if !adapted.is_empty() => adapted,
            _ => state.require_str(PLAN)?,
        };
        let prompt = format!(
            "Execute this plan to write about '{}':\n\nPlan:\n{}\n\n\
             Write a well-structured summary following the plan. Target ~200 words.",
            topic, plan
        );
        let (result, messages) = converse(state, ctx, None, prompt).await?;
        Ok(Delta::new()
            .set(FINAL_RESULT, result)
            .set(MESSAGES, messages))
    }
}

/// The full plan/evaluate/adapt/execute graph
pub fn strategic_graph(assessor: Arc<dyn PlanAssessor>) -> Result<CompiledGraph, GraphError> {
    let router = RuleRouter::new()
        .when(&format!("{} == true", ADAPTATION_NEEDED), "adapt")
        .map_err(|e| GraphError::validation(e.to_string()))?
        .otherwise("execute");

    let mut graph = StateGraph::new("strategic").with_schema(strategic_schema());
    graph
        .add_node("plan", Arc::new(PlanStep))
        .add_node("evaluate", Arc::new(EvaluateStep::new(assessor)))
        .add_node("adapt", Arc::new(AdaptStep))
        .add_node("execute", Arc::new(ExecuteStep))
        .set_entry_point("plan")
        .add_edge("plan", "evaluate")
        .add_conditional_edges("evaluate", Arc::new(router))
        .add_edge("adapt", "execute")
        .add_edge("execute", END);
    graph.compile()
}
