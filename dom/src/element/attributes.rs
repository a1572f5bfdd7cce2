//! Attribute ↔ state value conversion.
//!
//! Observed attributes arrive as strings; prop cells hold structured
//! values. Structured-looking strings parse as JSON, everything else stays
//! a string. Serialization inverts that: strings pass through bare, other
//! values render as JSON.

use serde_json::Value;

/// Deserialize an attribute value into a prop value. A missing attribute
/// is null.
pub fn deserialize(raw: Option<&str>) -> Value {
    match raw {
        None => Value::Null,
        Some(s) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string())),
    }
}

/// Serialize a prop value back to attribute form.
pub fn serialize(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
