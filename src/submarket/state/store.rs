// SPDX-License-Identifier: MIT

//! Runtime state storage for report execution

use serde_json::{Map, Value};

use crate::adk::error::ReportError;

/// One row of a normalized table: column name to JSON value, in column order
pub type Record = Map<String, Value>;

/// Runtime report state
///
/// Values are overwritten key-wise on merge; keys a merge does not mention
/// are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportState {
    fields: Map<String, Value>,
}

impl ReportState {
    /// Create an empty ReportState
    pub fn empty() -> Self {
        Self::default()
    }

    /// Apply a partial update
    pub fn merge(&mut self, update: StateUpdate) {
        for (key, value) in update.values {
            self.fields.insert(key, value);
        }
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Read a string field
    pub fn text(&self, key: &str) -> Result<&str, ReportError> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| ReportError::missing_state(key))
    }

    /// Read a table field (a sequence of records)
    pub fn records(&self, key: &str) -> Result<Vec<Record>, ReportError> {
        let rows = self
            .fields
            .get(key)
            .and_then(Value::as_array)
            .ok_or_else(|| ReportError::missing_state(key))?;

        rows.iter()
            .map(|row| {
                row.as_object()
                    .cloned()
                    .ok_or_else(|| ReportError::missing_state(key))
            })
            .collect()
    }

    /// Read the single record of a singleton table
    pub fn first_record(&self, key: &str) -> Result<Record, ReportError> {
        self.records(key)?
            .into_iter()
            .next()
            .ok_or_else(|| ReportError::missing_state(key))
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Get all field names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }
}

/// A node's partial output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    values: Map<String, Value>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, replacing any previous value in this update
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Set a table key from records
    pub fn with_records(self, key: &str, rows: Vec<Record>) -> Self {
        let rows: Vec<Value> = rows.into_iter().map(Value::Object).collect();
        self.with(key, Value::Array(rows))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
