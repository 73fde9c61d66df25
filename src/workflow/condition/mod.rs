// SPDX-License-Identifier: MIT

//! Condition evaluation for routing rules
//!
//! Conditions are small expressions over typed state fields:
//! - `adaptation_needed`
//! - `plan_quality_score < 6`
//! - `intent == 'bug' and priority > 3`
//!
//! They never inspect free model text; a classification Step must first
//! turn text into a typed field.

mod ast;
mod evaluator;
mod parser;

pub use ast::{CompareOp, Expression, Literal};
pub use evaluator::evaluate;
pub use parser::{parse, ParseError};
