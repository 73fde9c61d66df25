// SPDX-License-Identifier: MIT

//! Graph loader - YAML graph definitions
//!
//! A definition names its Steps; the code behind each name comes from a
//! [`StepRegistry`]. Routing is either inline `when` rules or a named
//! Router from the same registry.
//!
//! ```yaml
//! name: strategic
//! entry: plan
//! state:
//!   topic: { type: string }
//!   adaptation_needed: { type: boolean, default: false }
//! nodes:
//!   - id: plan
//!     step: plan
//!     next: evaluate
//!   - id: evaluate
//!     step: evaluate
//!     routes:
//!       - when: adaptation_needed
//!         to: adapt
//!     default: execute
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::adk::error::GraphError;
use crate::workflow::graph::{CompiledGraph, StateGraph};
use crate::workflow::registry::StepRegistry;
use crate::workflow::router::RuleRouter;
use crate::workflow::state::StateSchema;

/// A graph definition as written in YAML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub entry: String,
    /// Field name to `{ type, default }`
    #[serde(default)]
    pub state: StateSchema,
    pub max_steps: Option<usize>,
    pub nodes: Vec<NodeDefinition>,
}

/// One node and its outgoing edge.
///
/// Exactly one of `next`, `routes`/`default`, or `router` must be given.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeDefinition {
    pub id: String,
    /// Registered Step name
    pub step: String,
    /// Unconditional successor, may be `__end__`
    pub next: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteDefinition>,
    pub default: Option<String>,
    /// Registered Router name
    pub router: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteDefinition {
    pub when: String,
    pub to: String,
}

/// Loads graph definitions from YAML files
pub struct GraphLoader;

impl GraphLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a graph definition from a YAML file
    pub fn load_definition<P: AsRef<Path>>(&self, path: P) -> Result<GraphDefinition, GraphError> {
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse a graph definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<GraphDefinition, GraphError> {
        let def: GraphDefinition = serde_yaml::from_str(content)?;
        Ok(def)
    }

    /// Resolve every name against `registry` and compile
    pub fn build(
        &self,
        def: &GraphDefinition,
        registry: &StepRegistry,
    ) -> Result<CompiledGraph, GraphError> {
        let mut graph = StateGraph::new(def.name.clone()).with_schema(def.state.clone());
        graph.set_entry_point(def.entry.clone());

        for node in &def.nodes {
            let step = registry.step(&node.step).ok_or_else(|| {
                GraphError::validation(format!(
                    "node '{}' uses unregistered step '{}'",
                    node.id, node.step
                ))
            })?;
            graph.add_node(node.id.clone(), step);

            let has_rules = !node.routes.is_empty() || node.default.is_some();
            match (&node.next, has_rules, &node.router) {
                (Some(next), false, None) => {
                    graph.add_edge(node.id.clone(), next.as_str());
                }
                (None, true, None) => {
                    let mut router = RuleRouter::new();
                    for route in &node.routes {
                        router = router.when(&route.when, route.to.as_str()).map_err(|e| {
                            GraphError::validation(format!("node '{}': {}", node.id, e))
                        })?;
                    }
                    if let Some(default) = &node.default {
                        router = router.otherwise(default.as_str());
                    }
                    graph.add_conditional_edges(node.id.clone(), Arc::new(router));
                }
                (None, false, Some(name)) => {
                    let router = registry.router(name).ok_or_else(|| {
                        GraphError::validation(format!(
                            "node '{}' uses unregistered router '{}'",
                            node.id, name
                        ))
                    })?;
                    graph.add_conditional_edges(node.id.clone(), router);
                }
                // No edge at all is reported by compile
                (None, false, None) => {}
                _ => {
                    return Err(GraphError::validation(format!(
                        "node '{}' must use exactly one of next, routes or router",
                        node.id
                    )))
                }
            }
        }

        let compiled = graph.compile()?;
        Ok(match def.max_steps {
            Some(max) => compiled.with_max_steps(max),
            None => compiled,
        })
    }

    /// Load, resolve and compile in one go
    pub fn build_file<P: AsRef<Path>>(
        &self,
        path: P,
        registry: &StepRegistry,
    ) -> Result<CompiledGraph, GraphError> {
        let def = self.load_definition(path)?;
        log::info!("Loaded graph definition '{}' ({} nodes)", def.name, def.nodes.len());
        self.build(&def, registry)
    }
}

impl Default for GraphLoader {
    fn default() -> Self {
        Self::new()
    }
}
