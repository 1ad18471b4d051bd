//! Record normalization helpers
//!
//! Provider payloads nest some fields (`hoa.fee`, `owner.names`). Processors
//! flatten them into dotted column names, apply renames, and reindex every row
//! onto a fixed column list so downstream readers see a stable schema.

use serde_json::{Map, Value};

use crate::submarket::state::Record;

/// Flatten nested objects into dotted keys. Arrays are kept as values.
pub fn flatten(record: &Record) -> Record {
    let mut flat = Map::new();
    flatten_into("", record, &mut flat);
    flat
}

fn flatten_into(prefix: &str, object: &Map<String, Value>, out: &mut Record) {
    for (key, value) in object {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(&name, inner, out),
            other => {
                out.insert(name, other.clone());
            }
        }
    }
}

/// Rename columns, keeping their position
pub fn rename(record: Record, renames: &[(&str, &str)]) -> Record {
    record
        .into_iter()
        .map(|(key, value)| {
            let key = renames
                .iter()
                .find(|(from, _)| *from == key)
                .map(|(_, to)| to.to_string())
                .unwrap_or(key);
            (key, value)
        })
        .collect()
}

/// Project onto `columns` in that order; absent columns become `null`
pub fn reindex(record: &Record, columns: &[&str]) -> Record {
    columns
        .iter()
        .map(|column| {
            let value = record.get(*column).cloned().unwrap_or(Value::Null);
            (column.to_string(), value)
        })
        .collect()
}

/// Flatten, rename, optionally derive, then reindex one raw row
pub fn normalize(record: &Record, renames: &[(&str, &str)], columns: &[&str]) -> Record {
    reindex(&rename(flatten(record), renames), columns)
}

/// Numeric value of a column; null, non-numeric, and NaN read as absent
pub fn number(record: &Record, column: &str) -> Option<f64> {
    record
        .get(column)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

/// JSON number for a float; non-finite values become `null`
pub fn float_value(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
