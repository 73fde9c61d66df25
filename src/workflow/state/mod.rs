// SPDX-License-Identifier: MIT

//! State management for graph workflows
//!
//! This module provides:
//! - `StateSchema` - declares the fields of a workflow state and their types
//! - `State` - the read-only view Steps receive
//! - `Delta` - the partial update a Step returns

mod schema;
mod store;

pub use schema::{FieldType, StateFieldDef, StateSchema};
pub use store::{Delta, State};
