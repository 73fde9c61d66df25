// SPDX-License-Identifier: MIT

//! Collaborator kit: the narrow capabilities Steps are handed
//!
//! - [error] - error taxonomy shared across the crate
//! - [model] - Model Client trait, OpenAI adapter, retry wrapper
//! - [tool] - Tool trait and tool specs

pub mod error;
pub mod model;
pub mod tool;
