// src/validate.rs
//! Lightweight sanity checks for decoded tabular payloads, applied by
//! callers before handing records to the writers.

use serde_json::{Map, Value};

use crate::error::{FetchError, Result};

/// Fail unless every required key is present on the record.
pub fn require_keys(record: &Map<String, Value>, required: &[&str]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|key| !record.contains_key(*key))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(FetchError::Validation(format!(
            "missing required keys: {}",
            missing.join(", ")
        )))
    }
}

/// Fail when any of the named fields parses as a negative number.
/// Null, absent, and non-numeric values are skipped.
pub fn ensure_non_negative(record: &Map<String, Value>, fields: &[&str]) -> Result<()> {
    let negatives: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|field| {
            as_number(record.get(*field)).is_some_and(|n| n < 0.0)
        })
        .collect();
    if negatives.is_empty() {
        Ok(())
    } else {
        Err(FetchError::Validation(format!(
            "negative values in fields: {}",
            negatives.join(", ")
        )))
    }
}

/// Run both checks over a decoded record batch.
pub fn validate_records(
    records: &[Value],
    required: &[&str],
    non_negative: &[&str],
) -> Result<()> {
    for record in records {
        let Some(record) = record.as_object() else {
            continue;
        };
        if !required.is_empty() {
            require_keys(record, required)?;
        }
        if !non_negative.is_empty() {
            ensure_non_negative(record, non_negative)?;
        }
    }
    Ok(())
}

fn as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        // CSV payloads carry everything as strings
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}
