//! Tolerant field deserializers for upstream JSON documents
//!
//! Authorization servers are loose about the types of informational fields.
//! A wrongly typed field should cost the caller that field, never the whole
//! document. Each helper is a `deserialize_with` target that maps anything
//! unusable to `None`; pair it with `#[serde(default)]`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A string field. Non-string values are dropped.
pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// A list of strings. A single space-separated string is split into a list;
/// non-string array members are skipped.
pub fn string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        Some(Value::String(s)) => Some(s.split_whitespace().map(str::to_string).collect()),
        _ => None,
    })
}

/// A duration in whole seconds, sent as a number or a numeric string.
/// Fractions are truncated; negative or non-numeric values are dropped.
pub fn seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().or_else(|| whole_seconds(n.as_f64()?)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| whole_seconds(s.parse::<f64>().ok()?))
        }
        _ => None,
    })
}

fn whole_seconds(secs: f64) -> Option<u64> {
    (secs.is_finite() && secs >= 0.0 && secs <= u64::MAX as f64).then(|| secs as u64)
}
