// SPDX-License-Identifier: MIT

use crate::adk::error::ToolError;
use crate::adk::tool::{Tool, ToolSpec};
use crate::workflow::router::Router;
use crate::workflow::step::Step;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Named tools shared by every Step of a run
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool.name().to_string(), tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    /// Specs of every registered tool, sorted by name
    pub async fn list_tools(&self) -> Vec<ToolSpec> {
        let tools = self.tools.read().await;
        let mut specs: Vec<ToolSpec> = tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        // Release the lock before the tool runs
        let tool = self.get(name).await.ok_or_else(|| ToolError::not_found(name))?;

        log::info!("Invoking tool: {}", name);
        tool.execute(args).await.map_err(|e| {
            log::error!("Tool {} failed: {}", name, e);
            ToolError::execution(name, e.to_string())
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Named Steps and Routers that graph definition files refer to
#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn Step>>,
    routers: HashMap<String, Arc<dyn Router>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_step(&mut self, name: impl Into<String>, step: Arc<dyn Step>) {
        self.steps.insert(name.into(), step);
    }

    pub fn register_router(&mut self, name: impl Into<String>, router: Arc<dyn Router>) {
        self.routers.insert(name.into(), router);
    }

    pub fn step(&self, name: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(name).cloned()
    }

    pub fn router(&self, name: &str) -> Option<Arc<dyn Router>> {
        self.routers.get(name).cloned()
    }

    pub fn step_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
