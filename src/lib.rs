// SPDX-License-Identifier: MIT

//! stepgraph - a strategic step graph engine
//!
//! Workflows are graphs of Steps over one shared State. Steps return
//! partial updates, Routers pick the next node from State, and every
//! completed node can be checkpointed so a thread resumes where it left off.
//!
//! - [`workflow`] - State Store, Step, Router and the Workflow Graph
//! - [`memory`] - Checkpoint Store and Knowledge Store
//! - [`adk`] - Model Client, tools and the error taxonomy
//! - [`patterns`] - ready-made Steps and graphs
//! - [`config`] - environment configuration

pub mod adk;
pub mod config;
pub mod memory;
pub mod patterns;
pub mod workflow;
