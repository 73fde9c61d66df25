// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::marker::PhantomData;

/// Trait for tools that Steps can invoke through the Tool Registry.
///
/// - `name()` and `description()` return `&str` to avoid allocation on every call
/// - `schema()` returns `&Value` to avoid cloning the schema on every access
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (must be unique within a registry)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's input parameters
    fn schema(&self) -> &Value;

    /// Execute the tool with the given input and return the result
    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema().clone(),
        }
    }
}

/// What a model needs to know to call a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

type Handler<A> = Box<dyn Fn(A) -> Result<Value, String> + Send + Sync>;

/// A tool built from a plain function over a typed argument struct.
///
/// The parameter schema is generated from `A`'s `JsonSchema` derive, so the
/// schema the model sees cannot drift from what the handler accepts.
pub struct FnTool<A> {
    name: String,
    description: String,
    schema: Value,
    handler: Handler<A>,
    _args: PhantomData<fn(A)>,
}

impl<A> FnTool<A>
where
    A: JsonSchema + DeserializeOwned + Send + 'static,
{
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl Fn(A) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(A)).unwrap_or(Value::Null);
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Box::new(handler),
            _args: PhantomData,
        }
    }
}

#[async_trait]
impl<A> Tool for FnTool<A>
where
    A: JsonSchema + DeserializeOwned + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let args: A = serde_json::from_value(input)?;
        (self.handler)(args).map_err(|e| e.into())
    }
}
