//! Node property values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed property values
///
/// Only scalar values and homogeneous lists are representable; graph stores
/// do not accept nested maps as node properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Convert an arbitrary JSON value. `null` and objects have no
    /// property representation and yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Null | Value::Object(_) => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(items) => Some(Self::List(
                items.iter().filter_map(Self::from_json).collect(),
            )),
        }
    }

    /// The value as it can be stored. NaN and infinities have no JSON or
    /// Cypher representation and are treated as absent, inside lists too.
    pub fn finite(self) -> Option<Self> {
        match self {
            Self::Float(f) if !f.is_finite() => None,
            Self::List(items) => Some(Self::List(items.into_iter().filter_map(Self::finite).collect())),
            other => Some(other),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items.into_iter().map(Self::String).collect())
    }
}

/// Properties collection, ordered by name
pub type Properties = BTreeMap<String, PropertyValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_null_and_objects_are_dropped() {
        assert_eq!(PropertyValue::from_json(&json!(null)), None);
        assert_eq!(PropertyValue::from_json(&json!({"a": 1})), None);
    }

    #[test]
    fn json_numbers_keep_integer_type() {
        assert_eq!(PropertyValue::from_json(&json!(12)), Some(PropertyValue::Int(12)));
        assert_eq!(PropertyValue::from_json(&json!(4.5)), Some(PropertyValue::Float(4.5)));
    }

    #[test]
    fn non_finite_floats_are_not_storable() {
        assert_eq!(PropertyValue::Float(f64::NAN).finite(), None);
        assert_eq!(PropertyValue::Float(f64::INFINITY).finite(), None);
        assert_eq!(PropertyValue::Float(4.5).finite(), Some(PropertyValue::Float(4.5)));

        let list = PropertyValue::List(vec![PropertyValue::Float(1.0), PropertyValue::Float(f64::NEG_INFINITY)]);
        assert_eq!(list.finite(), Some(PropertyValue::List(vec![PropertyValue::Float(1.0)])));
    }

    #[test]
    fn tags_keep_their_order() {
        let value = PropertyValue::from(vec!["litrpg".to_string(), "fantasy".to_string()]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"["litrpg","fantasy"]"#);
    }
}
