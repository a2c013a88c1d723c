//! License data returned by the licensing API.
//!
//! The payload is stored verbatim, so it is kept as a JSON object rather
//! than a fixed struct; accessors expose the fields the settings page and
//! the manager care about.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status reported when the licensing API could not be reached.
pub const STATUS_UNREACHABLE: &str = "unreachable";

/// Opaque structured payload from a prior remote check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseData(Map<String, Value>);

impl LicenseData {
    /// Wrap an already structured object.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Coerce a persisted value into license data.
    ///
    /// Empty values mean "no data". Lists become objects keyed by index and
    /// scalars are wrapped under `scalar`, so the result is always an object.
    pub fn coerce(value: &Value) -> Option<Self> {
        if is_empty_value(value) {
            return None;
        }

        let map = match value {
            Value::Object(map) => map.clone(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
            scalar => {
                let mut map = Map::new();
                map.insert("scalar".to_string(), scalar.clone());
                map
            }
        };

        Some(Self(map))
    }

    /// Status recorded when a request failed before any response was parsed.
    pub fn unreachable(error: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("success".to_string(), Value::Bool(false));
        map.insert(
            "license".to_string(),
            Value::String(STATUS_UNREACHABLE.to_string()),
        );
        map.insert("error".to_string(), Value::String(error.into()));
        Self(map)
    }

    /// License status (`valid`, `expired`, `disabled`, ...).
    pub fn status(&self) -> Option<&str> {
        self.0.get("license").and_then(Value::as_str)
    }

    /// Error code reported by the API, if any.
    pub fn error(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    /// Expiry date as reported (`lifetime` or a date string).
    pub fn expires(&self) -> Option<&str> {
        self.0.get("expires").and_then(Value::as_str)
    }

    /// Whether the API reported the license as valid.
    pub fn is_valid(&self) -> bool {
        self.status() == Some("valid")
    }

    /// Raw field access.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Mirrors the host's notion of an "empty" stored value.
pub(crate) fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
