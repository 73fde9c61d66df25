// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow execution
//!
//! `State` is the unit of data flow between Steps. Steps only ever see
//! `&State` and answer with a `Delta`; the executor merges the delta with
//! plain field-by-field overwrite. Fields are never deleted.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::schema::StateSchema;
use crate::adk::error::StepError;

/// Snapshot of every named field of one workflow run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    fields: BTreeMap<String, Value>,
}

/// Partial update returned by a Step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Delta {
    fields: BTreeMap<String, Value>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state seeded with the schema's defaults
    pub fn from_schema(schema: &StateSchema) -> Self {
        let fields = schema
            .fields
            .iter()
            .filter_map(|(name, def)| def.default.clone().map(|d| (name.clone(), d)))
            .collect();
        Self { fields }
    }

    /// Build a state from a JSON object
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Builder-style setter, used by callers assembling an initial state
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Pure merge: a new state where every field in `delta` overwrites
    pub fn merge(&self, delta: &Delta) -> State {
        let mut next = self.clone();
        next.apply(delta.clone());
        next
    }

    /// In-place merge, consuming the delta
    pub fn apply(&mut self, delta: Delta) {
        self.fields.extend(delta.fields);
    }

    /// Layer `other` under this state: only fields missing here are taken
    pub fn fill_missing_from(&mut self, other: &State) {
        for (k, v) in &other.fields {
            self.fields.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a nested field value using dot notation (e.g., "result.intent")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get all field names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Required field, present and non-null
    pub fn require(&self, key: &str) -> Result<&Value, StepError> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Err(StepError::invalid_state(format!(
                "required field '{}' is missing",
                key
            ))),
            Some(v) => Ok(v),
        }
    }

    pub fn require_str(&self, key: &str) -> Result<&str, StepError> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| malformed(key, "a string"))
    }

    pub fn require_bool(&self, key: &str) -> Result<bool, StepError> {
        self.require(key)?
            .as_bool()
            .ok_or_else(|| malformed(key, "a boolean"))
    }

    pub fn require_i64(&self, key: &str) -> Result<i64, StepError> {
        self.require(key)?
            .as_i64()
            .ok_or_else(|| malformed(key, "an integer"))
    }

    pub fn require_f64(&self, key: &str) -> Result<f64, StepError> {
        self.require(key)?
            .as_f64()
            .ok_or_else(|| malformed(key, "a number"))
    }

    pub fn require_array(&self, key: &str) -> Result<&Vec<Value>, StepError> {
        self.require(key)?
            .as_array()
            .ok_or_else(|| malformed(key, "an array"))
    }

    /// Deserialize a required field into a typed value
    pub fn require_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, StepError> {
        let value = self.require(key)?;
        serde_json::from_value(value.clone())
            .map_err(|e| StepError::invalid_state(format!("field '{}' is malformed: {}", key, e)))
    }

    /// Optional string field; empty strings count as absent
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

fn malformed(key: &str, expected: &str) -> StepError {
    StepError::invalid_state(format!("field '{}' is not {}", key, expected))
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl From<State> for Delta {
    fn from(state: State) -> Self {
        Self {
            fields: state.fields,
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Delta {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for State {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
