//! A2UI Value Types
//!
//! Property values carried by component nodes. Every accessor degrades to
//! `None` on a kind mismatch instead of failing, so renderers can fall back to
//! their per-type defaults.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A property value as it appears on the wire.
///
/// # Examples
///
/// ```json
/// "Hello"
/// 42
/// 0.5
/// true
/// null
/// ["a", 1]
/// {"screenId": "home"}
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UiValue {
    /// JSON `null`
    #[default]
    Null,
    Bool(bool),
    /// Whole numbers that fit in an `i64`
    Integer(i64),
    /// Any other number
    Float(f64),
    String(String),
    Array(Vec<UiValue>),
    Object(IndexMap<String, UiValue>),
}

impl UiValue {
    /// Get the string if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            UiValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer reading of this value.
    ///
    /// Floats are truncated toward zero; non-finite floats read as absent.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            UiValue::Integer(i) => Some(*i),
            UiValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            _ => None,
        }
    }

    /// Floating reading of this value. Integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            UiValue::Float(f) => Some(*f),
            UiValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            UiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[UiValue]> {
        match self {
            UiValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, UiValue>> {
        match self {
            UiValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, UiValue::Null)
    }

    /// Look up a key when this is an object
    pub fn get(&self, key: &str) -> Option<&UiValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Short name of the value kind, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            UiValue::Null => "null",
            UiValue::Bool(_) => "boolean",
            UiValue::Integer(_) => "integer",
            UiValue::Float(_) => "float",
            UiValue::String(_) => "string",
            UiValue::Array(_) => "array",
            UiValue::Object(_) => "object",
        }
    }
}

impl From<&str> for UiValue {
    fn from(s: &str) -> Self {
        UiValue::String(s.to_string())
    }
}

impl From<String> for UiValue {
    fn from(s: String) -> Self {
        UiValue::String(s)
    }
}

impl From<i64> for UiValue {
    fn from(i: i64) -> Self {
        UiValue::Integer(i)
    }
}

impl From<i32> for UiValue {
    fn from(i: i32) -> Self {
        UiValue::Integer(i64::from(i))
    }
}

impl From<f64> for UiValue {
    fn from(f: f64) -> Self {
        UiValue::Float(f)
    }
}

impl From<bool> for UiValue {
    fn from(b: bool) -> Self {
        UiValue::Bool(b)
    }
}

impl From<Vec<UiValue>> for UiValue {
    fn from(items: Vec<UiValue>) -> Self {
        UiValue::Array(items)
    }
}

impl From<serde_json::Value> for UiValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => UiValue::Null,
            serde_json::Value::Bool(b) => UiValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => UiValue::Integer(i),
                None => UiValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => UiValue::String(s),
            serde_json::Value::Array(items) => {
                UiValue::Array(items.into_iter().map(UiValue::from).collect())
            }
            serde_json::Value::Object(map) => UiValue::Object(
                map.into_iter().map(|(k, v)| (k, UiValue::from(v))).collect(),
            ),
        }
    }
}

impl From<UiValue> for serde_json::Value {
    fn from(value: UiValue) -> Self {
        match value {
            UiValue::Null => serde_json::Value::Null,
            UiValue::Bool(b) => serde_json::Value::Bool(b),
            UiValue::Integer(i) => serde_json::Value::from(i),
            // Non-finite floats have no JSON form and become null
            UiValue::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            UiValue::String(s) => serde_json::Value::String(s),
            UiValue::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            UiValue::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        let value: UiValue = serde_json::from_str(r#""Hello""#).unwrap();
        assert_eq!(value.as_str(), Some("Hello"));

        let value: UiValue = serde_json::from_str("42").unwrap();
        assert_eq!(value, UiValue::Integer(42));

        let value: UiValue = serde_json::from_str("2.75").unwrap();
        assert_eq!(value, UiValue::Float(2.75));

        let value: UiValue = serde_json::from_str("true").unwrap();
        assert_eq!(value.as_bool(), Some(true));

        let value: UiValue = serde_json::from_str("null").unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_parse_nested() {
        let json = r#"{"screenId": "home", "tags": ["a", 1, null]}"#;
        let value: UiValue = serde_json::from_str(json).unwrap();

        assert_eq!(value.get("screenId").and_then(UiValue::as_str), Some("home"));
        let tags = value.get("tags").and_then(UiValue::as_array).unwrap();
        assert_eq!(tags.len(), 3);
        assert!(tags[2].is_null());
    }

    #[test]
    fn test_mismatched_access_is_absent() {
        let value = UiValue::from(7);
        assert_eq!(value.as_str(), None);
        assert_eq!(value.as_bool(), None);
        assert_eq!(UiValue::from("7").as_i64(), None);
    }

    #[test]
    fn test_numeric_coercions() {
        assert_eq!(UiValue::Float(3.9).as_i64(), Some(3));
        assert_eq!(UiValue::Float(-3.9).as_i64(), Some(-3));
        assert_eq!(UiValue::Float(f64::NAN).as_i64(), None);
        assert_eq!(UiValue::Integer(4).as_f64(), Some(4.0));
    }

    #[test]
    fn test_json_value_conversion() {
        let json = serde_json::json!({"a": [1, 2.5, "x"], "b": false});
        let value = UiValue::from(json.clone());
        assert_eq!(value.get("b").and_then(UiValue::as_bool), Some(false));
        assert_eq!(serde_json::Value::from(value), json);
    }
}
