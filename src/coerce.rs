//! Total coercions from heterogeneous source JSON to fixed types.
//!
//! The source streams mix types within the same field across records:
//! numbers arrive as numeric strings, lists as scalars, maps as
//! JSON-encoded strings, and absent values as sentinel strings. Every
//! function here is total; malformed input maps to a typed default so
//! downstream components never re-implement defensive parsing.

use std::collections::BTreeMap;

use serde_json::Value;

/// Sentinel strings the source uses to encode "no value" for list and
/// map fields. They normalize to empty containers.
pub const NULL_SENTINELS: [&str; 4] = [
    "NO_HOST_PREDICTED",
    "NO_GUEST_PREDICTED",
    "NO_NEITHER_IDENTIFIED",
    "SPEAKER_DATA_UNAVAILABLE",
];

fn is_sentinel(s: &str) -> bool {
    NULL_SENTINELS.contains(&s)
}

/// Numeric or numeric-string to f64; anything else to `default`.
pub fn coerce_float(value: Option<&Value>, default: f64) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(default),
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => default,
    }
}

/// Numeric or numeric-string to i64, truncating through float; anything
/// else to `default`.
pub fn coerce_int(value: Option<&Value>, default: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                n.as_f64().map(|f| f as i64).unwrap_or(default)
            }
        }
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(|f| f as i64)
            .unwrap_or(default),
        Some(Value::Bool(b)) => {
            if *b {
                1
            } else {
                0
            }
        }
        _ => default,
    }
}

/// Non-null to its trimmed string form; null/absent to `default`.
pub fn coerce_string(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) => {
            let t = s.trim();
            if t.is_empty() {
                default.to_string()
            } else {
                t.to_string()
            }
        }
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Anything to a list of strings.
///
/// Lists pass through (elements stringified); sentinel strings and
/// empty/whitespace strings become the empty list; a string that looks
/// like a JSON array is parsed; any other scalar becomes a singleton.
pub fn coerce_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(value_to_string).collect(),
        Some(Value::String(s)) => {
            let t = s.trim();
            if t.is_empty() || is_sentinel(t) {
                return Vec::new();
            }
            if t.starts_with('[') && t.ends_with(']') {
                if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(t) {
                    return items.iter().map(value_to_string).collect();
                }
            }
            vec![t.to_string()]
        }
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![value_to_string(other)],
    }
}

/// Anything to a string-to-string map.
///
/// Maps pass through; sentinels and non-map scalars become the empty
/// map; a JSON-object string is parsed.
pub fn coerce_dict(value: Option<&Value>) -> BTreeMap<String, String> {
    match value {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect(),
        Some(Value::String(s)) => {
            let t = s.trim();
            if t.is_empty() || is_sentinel(t) {
                return BTreeMap::new();
            }
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(t) {
                return map
                    .iter()
                    .map(|(k, v)| (k.clone(), value_to_string(v)))
                    .collect();
            }
            BTreeMap::new()
        }
        _ => BTreeMap::new(),
    }
}

/// Native bool, `"true"`/`"false"` (case-insensitive), or 1/0 to bool;
/// anything else to `default`.
pub fn coerce_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 1.0 => true,
            Some(f) if f == 0.0 => false,
            _ => default,
        },
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => default,
        },
        _ => default,
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
