//! Text encoding of semi-structured documents

use crate::observe::SyncObserver;
use serde_json::{Map, Value};
use std::fmt;

/// Codec failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The text is not a well-formed document
    #[error("Invalid JSON data: {0}")]
    Malformed(String),
}

/// The canonical "no data" value: an empty mapping
pub fn empty_document() -> Value {
    Value::Object(Map::new())
}

/// Whether a value carries no data
///
/// Empty mappings, empty lists, empty strings and null are all "no data".
/// `0` and `false` are real values.
pub fn is_empty_document(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Encode a value into its stored text form
///
/// Every "no data" value encodes to `""`; anything else encodes to compact JSON.
pub fn encode(value: &Value) -> String {
    if is_empty_document(value) {
        return String::new();
    }
    // Serializing a `Value` into a string cannot fail: keys are always strings
    // and there is no I/O involved.
    value.to_string()
}

/// Decode stored text, reporting malformed input as an error
///
/// Empty text decodes to an empty mapping.
pub fn try_decode(text: &str) -> Result<Value, CodecError> {
    if text.trim().is_empty() {
        return Ok(empty_document());
    }
    serde_json::from_str(text).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Decode stored text, absorbing malformed input
///
/// Corrupt text is logged and read as an empty mapping so that a damaged row
/// never breaks a read path.
pub fn decode(text: &str) -> Value {
    match try_decode(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, text = %text, "Unable to deserialize stored document");
            empty_document()
        }
    }
}

/// Like [`decode`], reporting malformed input to `observer`
pub fn decode_observed(text: &str, context: &str, observer: &dyn SyncObserver) -> Value {
    match try_decode(text) {
        Ok(value) => value,
        Err(e) => {
            observer.malformed_document(context, &e.to_string());
            empty_document()
        }
    }
}

/// Write-boundary check for user or API supplied text
///
/// The canonical empty representation is always accepted, as is `{}`.
pub fn validate(text: &str) -> Result<(), CodecError> {
    normalize(text).map(|_| ())
}

/// Validate `text` and return its canonical stored form
pub fn normalize(text: &str) -> Result<String, CodecError> {
    if text.is_empty() || text == "{}" {
        return Ok(String::new());
    }
    let value: Value =
        serde_json::from_str(text).map_err(|e| CodecError::Malformed(e.to_string()))?;
    Ok(encode(&value))
}

/// A document as returned by a fetcher, in stored text form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDocument(String);

impl RawDocument {
    /// Wrap response text as-is
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Encode a value
    pub fn from_value(value: &Value) -> Self {
        Self(encode(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode, reporting malformed text as an error
    pub fn decode(&self) -> Result<Value, CodecError> {
        try_decode(&self.0)
    }
}

impl fmt::Display for RawDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RawDocument {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for RawDocument {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::RecordingObserver;
    use serde_json::json;

    #[test]
    fn test_empty_values_collapse() {
        assert_eq!(encode(&json!({})), "");
        assert_eq!(encode(&json!([])), "");
        assert_eq!(encode(&Value::Null), "");
        assert_eq!(encode(&json!("")), "");
        assert_eq!(decode(""), json!({}));
        assert_eq!(encode(&decode("")), "");
    }

    #[test]
    fn test_zero_and_false_are_data() {
        assert_eq!(encode(&json!(0)), "0");
        assert_eq!(encode(&json!(false)), "false");
        assert_eq!(decode("0"), json!(0));
    }

    #[test]
    fn test_round_trip_nested() {
        let values = [
            json!({"id": "4", "name": "Mark", "location": {"id": 1, "name": "Palo Alto"}}),
            json!([1, "two", null, true, {"nested": [1.5, -3]}]),
            json!("plain string"),
            json!(12345678901234_i64),
        ];
        for value in values {
            let text = encode(&value);
            assert_eq!(decode(&text), value);
            // Re-encoding a decoded value is stable
            assert_eq!(encode(&decode(&text)), text);
        }
    }

    #[test]
    fn test_malformed_decodes_to_empty() {
        assert_eq!(decode("{not json"), json!({}));
        assert!(matches!(try_decode("{not json"), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_malformed_is_reported_to_observer() {
        let observer = RecordingObserver::new();
        let value = decode_observed("{not json", "entity 7", &observer);

        assert_eq!(value, json!({}));
        assert_eq!(observer.malformed_count(), 1);
        assert_eq!(observer.malformed_contexts(), vec!["entity 7".to_string()]);
    }

    #[test]
    fn test_validate_carve_outs() {
        assert!(validate("").is_ok());
        assert!(validate("{}").is_ok());
        assert!(validate(r#"{"a": 1}"#).is_ok());
        assert!(validate("{not json").is_err());
        assert!(validate("[1, 2").is_err());
    }

    #[test]
    fn test_normalize_reformats() {
        assert_eq!(normalize("{ \"a\" :  1 }").unwrap(), r#"{"a":1}"#);
        assert_eq!(normalize("[]").unwrap(), "");
        assert_eq!(normalize("{}").unwrap(), "");
    }

    #[test]
    fn test_raw_document() {
        let raw = RawDocument::from_value(&json!({"id": "1"}));
        assert!(!raw.is_empty());
        assert_eq!(raw.decode().unwrap(), json!({"id": "1"}));

        let empty = RawDocument::from_value(&json!({}));
        assert!(empty.is_empty());
        assert_eq!(empty.decode().unwrap(), json!({}));

        assert!(RawDocument::new("oops{").decode().is_err());
    }
}
