// SPDX-License-Identifier: MIT

//! Graph builder and compile-time validation
//!
//! `StateGraph` collects nodes and edges; `compile` checks the wiring once
//! and produces an immutable [`CompiledGraph`]. Nothing here runs a Step.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::executor::CompiledGraph;
use super::types::{Edge, DEFAULT_MAX_STEPS};
use crate::adk::error::GraphError;
use crate::workflow::router::{Router, Target, END, START};
use crate::workflow::state::StateSchema;
use crate::workflow::step::Step;

pub struct StateGraph {
    name: String,
    schema: StateSchema,
    nodes: Vec<(String, Arc<dyn Step>)>,
    edges: Vec<(String, Edge)>,
    entry: Option<String>,
}

impl StateGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: StateSchema::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
            entry: None,
        }
    }

    pub fn with_schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn add_node(&mut self, name: impl Into<String>, step: Arc<dyn Step>) -> &mut Self {
        self.nodes.push((name.into(), step));
        self
    }

    /// Unconditional edge; `to` may be [`END`]
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<Target>) -> &mut Self {
        self.edges.push((from.into(), Edge::Static(to.into())));
        self
    }

    pub fn add_conditional_edges(
        &mut self,
        from: impl Into<String>,
        router: Arc<dyn Router>,
    ) -> &mut Self {
        self.edges.push((from.into(), Edge::Conditional(router)));
        self
    }

    pub fn set_entry_point(&mut self, name: impl Into<String>) -> &mut Self {
        self.entry = Some(name.into());
        self
    }

    /// `(reader, field)` pairs for declared reads that no node writes and
    /// the schema gives no default. Readers are node names, or `from->`
    /// for the router on `from`.
    ///
    /// Initial input may still seed these, so compile only warns.
    pub fn unseeded_reads(&self) -> Vec<(String, String)> {
        let written: HashSet<String> = self
            .nodes
            .iter()
            .flat_map(|(_, step)| step.writes())
            .collect();
        let seeded = |field: &str| {
            written.contains(field)
                || self
                    .schema
                    .fields
                    .get(field)
                    .is_some_and(|def| def.default.is_some())
        };

        let node_reads = self
            .nodes
            .iter()
            .flat_map(|(name, step)| step.reads().into_iter().map(move |f| (name.clone(), f)));
        let router_reads = self.edges.iter().flat_map(|(from, edge)| match edge {
            Edge::Conditional(router) => router
                .reads()
                .into_iter()
                .map(|f| (format!("{}->", from), f))
                .collect::<Vec<_>>(),
            Edge::Static(_) => Vec::new(),
        });

        let mut unseeded: Vec<(String, String)> = node_reads
            .chain(router_reads)
            .filter(|(_, field)| !seeded(field))
            .collect();
        unseeded.sort();
        unseeded.dedup();
        unseeded
    }

    /// Validate the wiring and freeze the graph.
    ///
    /// Every problem found is reported in one `GraphError::Validation`.
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        let mut problems = Vec::new();

        let mut declared: HashSet<&str> = HashSet::new();
        for (name, _) in &self.nodes {
            if name.is_empty() || name == START || name == END {
                problems.push(format!("'{}' is not a valid node name", name));
            } else if !declared.insert(name.as_str()) {
                problems.push(format!("node '{}' is declared twice", name));
            }
        }

        let entry = match &self.entry {
            None => {
                problems.push("no entry point set".to_string());
                None
            }
            Some(entry) if !declared.contains(entry.as_str()) => {
                problems.push(format!("entry point '{}' is not a declared node", entry));
                None
            }
            Some(entry) => Some(entry.clone()),
        };

        let mut outgoing: HashMap<&str, &Edge> = HashMap::new();
        for (from, edge) in &self.edges {
            if !declared.contains(from.as_str()) {
                problems.push(format!("edge from undeclared node '{}'", from));
                continue;
            }
            if outgoing.insert(from.as_str(), edge).is_some() {
                problems.push(format!("node '{}' has more than one outgoing edge", from));
            }

            let targets = edge.targets();
            if targets.is_empty() {
                problems.push(format!("router on '{}' declares no targets", from));
            }
            for target in targets {
                if let Target::Node(to) = &target {
                    if !declared.contains(to.as_str()) {
                        problems.push(format!(
                            "edge from '{}' targets undeclared node '{}'",
                            from, to
                        ));
                    }
                }
            }
        }

        for (name, _) in &self.nodes {
            if !outgoing.contains_key(name.as_str()) {
                problems.push(format!("node '{}' has no outgoing edge", name));
            }
        }

        if let Some(cycle) = static_cycle(&outgoing) {
            problems.push(format!(
                "unconditional edges form a cycle: {}",
                cycle.join(" -> ")
            ));
        }

        if let Some(entry) = &entry {
            let (reached, reaches_end) = reachable(entry, &outgoing);
            for (name, _) in &self.nodes {
                if !reached.contains(name.as_str()) {
                    problems.push(format!("node '{}' is unreachable from '{}'", name, entry));
                }
            }
            if !reaches_end {
                problems.push(format!("no path from '{}' reaches {}", entry, END));
            }
        }

        if !self.schema.is_empty() {
            for (name, step) in &self.nodes {
                for field in step.reads().iter().chain(step.writes().iter()) {
                    if !self.schema.contains(field) {
                        problems.push(format!(
                            "node '{}' declares field '{}' missing from the state schema",
                            name, field
                        ));
                    }
                }
            }
            for (from, edge) in &self.edges {
                if let Edge::Conditional(router) = edge {
                    for field in router.reads() {
                        if !self.schema.contains(&field) {
                            problems.push(format!(
                                "router on '{}' reads field '{}' missing from the state schema",
                                from, field
                            ));
                        }
                    }
                }
            }
        }

        if !problems.is_empty() {
            log::error!("Graph '{}' failed validation: {}", self.name, problems.join("; "));
            return Err(GraphError::validation(problems.join("; ")));
        }
        for (reader, field) in self.unseeded_reads() {
            log::warn!(
                "Graph '{}': '{}' reads '{}', which no node writes and the schema does not default",
                self.name,
                reader,
                field
            );
        }

        // Validation guarantees an entry point from here on
        let entry = entry.ok_or_else(|| GraphError::validation("no entry point set"))?;

        let order: Vec<String> = self.nodes.iter().map(|(n, _)| n.clone()).collect();
        log::info!(
            "Compiled graph '{}' with {} nodes, entry '{}'",
            self.name,
            order.len(),
            entry
        );

        Ok(CompiledGraph {
            name: self.name,
            schema: self.schema,
            nodes: self.nodes.into_iter().collect(),
            order,
            edges: self.edges.into_iter().collect(),
            entry,
            checkpointer: None,
            max_steps: DEFAULT_MAX_STEPS,
        })
    }
}

/// Find a loop made only of unconditional edges.
///
/// Each node has at most one outgoing edge, so walking static edges from
/// any node either ends or revisits a node.
fn static_cycle(outgoing: &HashMap<&str, &Edge>) -> Option<Vec<String>> {
    let mut starts: Vec<&str> = outgoing.keys().copied().collect();
    starts.sort_unstable();

    for start in starts {
        let mut path: Vec<&str> = vec![start];
        let mut current = start;
        while let Some(Edge::Static(Target::Node(next))) = outgoing.get(current) {
            if let Some(pos) = path.iter().position(|n| *n == next.as_str()) {
                let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
                cycle.push(next.clone());
                return Some(cycle);
            }
            path.push(next.as_str());
            current = next.as_str();
        }
    }
    None
}

/// Breadth-first walk over every declared edge target
fn reachable(entry: &str, outgoing: &HashMap<&str, &Edge>) -> (HashSet<String>, bool) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut reaches_end = false;
    let mut queue: VecDeque<String> = VecDeque::from([entry.to_string()]);

    while let Some(node) = queue.pop_front() {
        if !seen.insert(node.clone()) {
            continue;
        }
        let Some(edge) = outgoing.get(node.as_str()) else {
            continue;
        };
        for target in edge.targets() {
            match target {
                Target::End => reaches_end = true,
                Target::Node(next) if !seen.contains(&next) => queue.push_back(next),
                Target::Node(_) => {}
            }
        }
    }
    (seen, reaches_end)
}
