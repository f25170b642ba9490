//! Best-effort structural parsing of peer and oracle answers
//!
//! Answers are never evaluated; a payload either parses into a structured JSON
//! document (object or array) or is treated as absent.

use serde_json::Value;

/// Parse a raw payload into a structured document
pub fn parse_response(payload: &[u8]) -> Option<Value> {
    let value: Value = serde_json::from_slice(payload).ok()?;
    into_structured(value)
}

/// Coerce a value into a structured document
///
/// Objects and arrays pass through. A string holding a JSON document is
/// unwrapped once. Scalars and null are rejected.
pub fn into_structured(value: Value) -> Option<Value> {
    match value {
        Value::Object(_) | Value::Array(_) => Some(value),
        Value::String(text) => match serde_json::from_str::<Value>(text.trim()) {
            Ok(inner @ Value::Object(_)) | Ok(inner @ Value::Array(_)) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}
