// src/catalog/template.rs
//! Placeholder substitution and defaults merging for catalog templates.
//!
//! Templates are plain `serde_json::Value` trees taken verbatim from the
//! catalog document; parameters are a string-keyed map of JSON values.

use serde_json::{Map, Value};

/// Substitute parameters into a single scalar.
///
/// Two rules, in order:
/// 1. If the whole string equals a parameter key, the raw parameter value is
///    returned as-is. This is the type-preserving path: a query field whose
///    template is exactly `"roc_year"` receives the numeric value, not a
///    stringified copy.
/// 2. Otherwise every `{key}` occurrence is replaced with the stringified
///    value. Unmatched placeholders survive verbatim so optional tokens in
///    generic entries do not error out.
pub fn substitute(value: &Value, params: &Map<String, Value>) -> Value {
    let Value::String(s) = value else {
        return value.clone();
    };
    if let Some(raw) = params.get(s) {
        return raw.clone();
    }
    let mut result = s.clone();
    for (key, param_value) in params {
        let placeholder = format!("{{{key}}}");
        if result.contains(&placeholder) {
            result = result.replace(&placeholder, &stringify(param_value));
        }
    }
    Value::String(result)
}

/// Recursive substitution over mappings and sequences, preserving order.
pub fn apply_template(value: &Value, params: &Map<String, Value>) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), apply_template(v, params)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| apply_template(v, params)).collect())
        }
        scalar => substitute(scalar, params),
    }
}

/// Shallow two-level merge: override keys win.
///
/// Returns `None` when both sides are absent, so "no policy configured" stays
/// distinguishable from "empty policy".
pub fn merge_maps(
    base: Option<&Map<String, Value>>,
    overrides: Option<&Map<String, Value>>,
) -> Option<Map<String, Value>> {
    if base.is_none() && overrides.is_none() {
        return None;
    }
    let mut merged = Map::new();
    if let Some(base) = base {
        merged.extend(base.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let Some(overrides) = overrides {
        merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    Some(merged)
}

/// Render a parameter value the way it should appear inside a URL or header.
/// Bare strings drop their JSON quotes; everything else serializes compactly.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
