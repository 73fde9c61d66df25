// SPDX-License-Identifier: MIT

//! Graph executor
//!
//! Runs one node at a time from the entry point until a route reaches
//! [`END`]. After every node the delta is checked against the schema and
//! merged, the next node is chosen, and a checkpoint is written when a
//! store and thread id are present. The executor never retries.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use super::types::{Edge, InvokeConfig, RunOutcome, RECENT_NODES};
use crate::adk::error::{GraphError, MemoryError, RunError};
use crate::memory::{Checkpoint, CheckpointStore};
use crate::workflow::router::{Target, END, START};
use crate::workflow::state::{Delta, State, StateSchema};
use crate::workflow::step::{Collaborators, Step};

/// A validated, immutable graph ready to invoke.
///
/// Invocations share nothing but the attached stores, so one compiled graph
/// can serve many concurrent runs.
pub struct CompiledGraph {
    pub(super) name: String,
    pub(super) schema: StateSchema,
    pub(super) nodes: HashMap<String, Arc<dyn Step>>,
    pub(super) order: Vec<String>,
    pub(super) edges: HashMap<String, Edge>,
    pub(super) entry: String,
    pub(super) checkpointer: Option<Arc<dyn CheckpointStore>>,
    pub(super) max_steps: usize,
}

/// Progress of one invocation, reported on failure
#[derive(Default)]
struct Trace {
    visited: Vec<String>,
    last_completed: Option<String>,
    checkpoint_seq: Option<u64>,
    resumed: bool,
}

impl CompiledGraph {
    pub fn with_checkpointer(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpointer = Some(store);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn entry_point(&self) -> &str {
        &self.entry
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Node names in declaration order
    pub fn node_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Run the graph to completion.
    ///
    /// With a thread id and an attached store, the latest checkpoint for the
    /// thread replaces `initial` field by field; fields only `initial` has
    /// are layered on top. A checkpoint left by an unfinished run also sets
    /// where execution picks up.
    pub async fn invoke(
        &self,
        initial: State,
        ctx: &Collaborators,
        config: InvokeConfig,
    ) -> Result<RunOutcome, RunError> {
        let mut trace = Trace::default();
        match self.run(initial, ctx, &config, &mut trace).await {
            Ok(state) => Ok(RunOutcome {
                state,
                visited: trace.visited,
                checkpoint_seq: trace.checkpoint_seq,
                resumed: trace.resumed,
            }),
            Err(error) => {
                log::error!("Graph '{}' failed: {}", self.name, error);
                Err(RunError {
                    error,
                    last_completed: trace.last_completed,
                    visited: trace.visited,
                })
            }
        }
    }

    /// Latest checkpoint for a thread, `None` without a store or history
    pub async fn get_state(&self, thread_id: &str) -> Result<Option<Checkpoint>, GraphError> {
        let Some(store) = &self.checkpointer else {
            return Ok(None);
        };
        store
            .load_latest(thread_id)
            .await
            .map_err(|source| GraphError::CheckpointLoad {
                thread_id: thread_id.to_string(),
                source,
            })
    }

    /// Mermaid flowchart of the graph; dashed arrows are routed edges
    pub fn mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        let _ = writeln!(out, "    {} --> {}", START, self.entry);
        for name in &self.order {
            let Some(edge) = self.edges.get(name) else {
                continue;
            };
            let arrow = match edge {
                Edge::Static(_) => "-->",
                Edge::Conditional(_) => "-.->",
            };
            for target in edge.targets() {
                let _ = writeln!(out, "    {} {} {}", name, arrow, target);
            }
        }
        out
    }

    async fn run(
        &self,
        initial: State,
        ctx: &Collaborators,
        config: &InvokeConfig,
        trace: &mut Trace,
    ) -> Result<State, GraphError> {
        let store = self
            .checkpointer
            .as_ref()
            .zip(config.thread_id.as_deref());

        let mut state = State::from_schema(&self.schema);
        state.apply(Delta::from(initial));
        let mut current = self.entry.clone();
        let mut seq = 0;

        if let Some((store, thread_id)) = store {
            let latest = store
                .load_latest(thread_id)
                .await
                .map_err(|source| GraphError::CheckpointLoad {
                    thread_id: thread_id.to_string(),
                    source,
                })?;

            if let Some(checkpoint) = latest {
                log::info!(
                    "Resuming thread '{}' from checkpoint {} after node '{}'",
                    thread_id,
                    checkpoint.seq,
                    checkpoint.node
                );
                if let Some(next) = &checkpoint.next {
                    if !self.nodes.contains_key(next) {
                        return Err(GraphError::CheckpointLoad {
                            thread_id: thread_id.to_string(),
                            source: MemoryError::Backend(format!(
                                "checkpoint resumes at unknown node '{}'",
                                next
                            )),
                        });
                    }
                    current = next.clone();
                }
                let mut resumed = checkpoint.state;
                resumed.fill_missing_from(&state);
                state = resumed;
                seq = checkpoint.seq;
                trace.resumed = true;
            }
        }

        if let Some(input) = &config.resume_input {
            state = state.merge(input);
        }
        self.schema
            .check_state(&state)
            .map_err(|message| GraphError::InvalidState {
                node: START.to_string(),
                message,
            })?;

        let mut steps = 0;
        loop {
            if config.is_cancelled() {
                log::info!("Graph '{}' cancelled before node '{}'", self.name, current);
                return Err(GraphError::Cancelled { next: current });
            }
            if steps >= self.max_steps {
                let skip = trace.visited.len().saturating_sub(RECENT_NODES);
                return Err(GraphError::StepLimitExceeded {
                    limit: self.max_steps,
                    recent: trace.visited[skip..].to_vec(),
                });
            }
            steps += 1;

            let step = self.nodes.get(&current).ok_or_else(|| GraphError::InvalidRoute {
                from: trace
                    .last_completed
                    .clone()
                    .unwrap_or_else(|| START.to_string()),
                target: current.clone(),
            })?;
            trace.visited.push(current.clone());
            log::info!("Executing node: {}", current);

            let delta = step
                .execute(&state, ctx)
                .await
                .map_err(|e| GraphError::from_step(&current, e))?;
            self.check_delta(&current, step.as_ref(), &delta)?;
            state.apply(delta);

            let next = self.next_target(&current, &state)?;

            if let Some((store, thread_id)) = store {
                seq += 1;
                let checkpoint = Checkpoint::new(thread_id, seq, current.clone(), state.clone())
                    .with_next(next.node().map(str::to_string));
                store
                    .save(checkpoint)
                    .await
                    .map_err(|source| GraphError::CheckpointWrite {
                        thread_id: thread_id.to_string(),
                        source,
                    })?;
                trace.checkpoint_seq = Some(seq);
            }
            trace.last_completed = Some(current.clone());

            match next {
                Target::End => {
                    log::info!(
                        "Graph '{}' reached {} after {} steps",
                        self.name,
                        END,
                        steps
                    );
                    return Ok(state);
                }
                Target::Node(name) => current = name,
            }
        }
    }

    /// Reject deltas that break the schema or the Step's declared writes
    fn check_delta(&self, node: &str, step: &dyn Step, delta: &Delta) -> Result<(), GraphError> {
        let invalid = |message: String| GraphError::InvalidState {
            node: node.to_string(),
            message,
        };

        let writes = step.writes();
        if !writes.is_empty() {
            if let Some(field) = delta.keys().find(|k| !writes.contains(*k)) {
                return Err(invalid(format!(
                    "wrote field '{}' it does not declare",
                    field
                )));
            }
        }
        self.schema.check_delta(delta).map_err(invalid)
    }

    fn next_target(&self, node: &str, state: &State) -> Result<Target, GraphError> {
        let target = match self.edges.get(node) {
            Some(Edge::Static(target)) => target.clone(),
            Some(Edge::Conditional(router)) => router
                .route(state)
                .map_err(|e| GraphError::from_step(node, e))?,
            // compile guarantees an edge per node
            None => Target::End,
        };

        if let Target::Node(name) = &target {
            if !self.nodes.contains_key(name) {
                return Err(GraphError::InvalidRoute {
                    from: node.to_string(),
                    target: name.clone(),
                });
            }
        }
        log::debug!("Routing {} -> {}", node, target);
        Ok(target)
    }
}
