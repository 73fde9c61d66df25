// SPDX-License-Identifier: MIT

//! Workflow graph: build, validate, execute

mod builder;
mod executor;
mod types;

pub use builder::StateGraph;
pub use executor::CompiledGraph;
pub use types::{CancelToken, Edge, InvokeConfig, RunOutcome, DEFAULT_MAX_STEPS, RECENT_NODES};
