// SPDX-License-Identifier: MIT

//! Run many independent invocations of one graph with bounded concurrency

use futures::stream::{self, StreamExt};

use crate::adk::error::RunError;
use crate::workflow::graph::{CompiledGraph, InvokeConfig, RunOutcome};
use crate::workflow::state::State;
use crate::workflow::step::Collaborators;

/// Invoke `graph` once per input, at most `concurrency` at a time.
///
/// Results come back in input order. One failed run does not stop the others.
pub async fn run_batch(
    graph: &CompiledGraph,
    ctx: &Collaborators,
    inputs: Vec<(State, InvokeConfig)>,
    concurrency: usize,
) -> Vec<Result<RunOutcome, RunError>> {
    let total = inputs.len();
    log::info!(
        "Running batch of {} on graph '{}' (concurrency {})",
        total,
        graph.name(),
        concurrency
    );

    let results: Vec<_> = stream::iter(inputs)
        .map(|(state, config)| graph.invoke(state, ctx, config))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        log::warn!("{} of {} batch runs failed", failed, total);
    }
    results
}
