// SPDX-License-Identifier: MIT

//! The step graph engine
//!
//! - [`state`] - State Store, Delta and schema
//! - [`step`] - the Step capability and its collaborators
//! - [`router`] - rule and closure Routers
//! - [`graph`] - builder, compile validation and executor
//! - [`loader`] - YAML graph definitions

pub mod batch;
pub mod condition;
pub mod graph;
pub mod loader;
pub mod registry;
pub mod router;
pub mod state;
pub mod step;

pub use batch::run_batch;
pub use graph::{CancelToken, CompiledGraph, InvokeConfig, RunOutcome, StateGraph};
pub use registry::{StepRegistry, ToolRegistry};
pub use router::{FnRouter, Router, RuleRouter, Target, END, START};
pub use state::{Delta, FieldType, State, StateSchema};
pub use step::{Collaborators, FnStep, Step};
