//! Parsed document trees
//!
//! Documents of any shape are represented as a tagged [`Node`] so that
//! malformed content fails in the pointer resolver with an explicit missing
//! token instead of surfacing as a type error somewhere downstream.

use std::collections::BTreeMap;

use anyhow::{Context, Result};

/// Leaf values
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    /// Integers above `i64::MAX`
    Unsigned(u64),
    Float(f64),
    String(String),
}

impl Scalar {
    /// Render as a mapping key. YAML allows non-string keys (e.g. `200:`).
    fn to_key(&self) -> String {
        match self {
            Scalar::Null => "null".to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Integer(i) => i.to_string(),
            Scalar::Unsigned(u) => u.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::String(s) => s.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Null => serde_json::Value::Null,
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Integer(i) => serde_json::Value::from(*i),
            Scalar::Unsigned(u) => serde_json::Value::from(*u),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Scalar::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// A node of a parsed document
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Object(BTreeMap<String, Node>),
    Array(Vec<Node>),
    Scalar(Scalar),
}

impl Node {
    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::Scalar(Scalar::String(value.into()))
    }

    /// Parse YAML (and therefore most JSON) text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(text).context("Failed to parse YAML document")?;
        Ok(Self::from(value))
    }

    /// Parse strict JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).context("Failed to parse JSON document")?;
        Ok(Self::from(value))
    }

    /// The reference string if this node is a reference object.
    ///
    /// Only objects whose `keyword` member is a string count. Sibling members
    /// of a reference object are ignored.
    pub fn as_reference(&self, keyword: &str) -> Option<&str> {
        match self {
            Node::Object(map) => match map.get(keyword) {
                Some(Node::Scalar(Scalar::String(reference))) => Some(reference),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Node::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Node::Array(items) => {
                serde_json::Value::Array(items.iter().map(Node::to_json).collect())
            }
            Node::Scalar(scalar) => scalar.to_json(),
        }
    }
}

impl From<Scalar> for Node {
    fn from(scalar: Scalar) -> Self {
        Node::Scalar(scalar)
    }
}

impl From<serde_yaml::Value> for Node {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value;

        match value {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => Node::Scalar(yaml_number(&n)),
            Value::String(s) => Node::string(s),
            Value::Sequence(items) => Node::Array(items.into_iter().map(Node::from).collect()),
            Value::Mapping(mapping) => Node::Object(
                mapping
                    .into_iter()
                    .map(|(k, v)| (yaml_key(k), Node::from(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Node::from(tagged.value),
        }
    }
}

impl From<serde_json::Value> for Node {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => Node::Scalar(number(n.as_i64(), n.as_u64(), n.as_f64())),
            Value::String(s) => Node::string(s),
            Value::Array(items) => Node::Array(items.into_iter().map(Node::from).collect()),
            Value::Object(map) => {
                Node::Object(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect())
            }
        }
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Scalar {
    number(n.as_i64(), n.as_u64(), n.as_f64())
}

/// Narrowest exact representation; floats only for non-integers
fn number(signed: Option<i64>, unsigned: Option<u64>, float: Option<f64>) -> Scalar {
    match (signed, unsigned) {
        (Some(i), _) => Scalar::Integer(i),
        (None, Some(u)) => Scalar::Unsigned(u),
        (None, None) => Scalar::Float(float.unwrap_or(f64::NAN)),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match Node::from(key) {
        Node::Scalar(scalar) => scalar.to_key(),
        // Complex keys have no pointer form; keep them addressable by their JSON text
        other => other.to_json().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_keys_are_stringified() {
        let node = Node::from_yaml_str(
            r#"
responses:
  200:
    description: OK
"#,
        )
        .unwrap();

        let ok = node.get("responses").and_then(|r| r.get("200")).unwrap();
        assert_eq!(ok.get("description").and_then(Node::as_str), Some("OK"));
    }

    #[test]
    fn test_as_reference_requires_string_value() {
        let reference = Node::from_yaml_str("$ref: '#/Profile'\ndescription: ignored").unwrap();
        assert_eq!(reference.as_reference("$ref"), Some("#/Profile"));

        // A property literally named "$ref" is data, not a reference
        let property = Node::from_yaml_str("$ref:\n  type: string").unwrap();
        assert_eq!(property.as_reference("$ref"), None);
    }

    #[test]
    fn test_json_roundtrip_keeps_scalars() {
        let node = Node::from_json_str(r#"{"a": [1, 2.5, true, null, "x"]}"#).unwrap();
        assert_eq!(
            node.to_json(),
            serde_json::json!({"a": [1, 2.5, true, null, "x"]})
        );
    }

    #[test]
    fn test_integers_beyond_i64_stay_exact() {
        let node = Node::from_yaml_str("maximum: 18446744073709551615\nminimum: -9223372036854775808\n")
            .unwrap();
        assert_eq!(
            node.get("maximum"),
            Some(&Node::Scalar(Scalar::Unsigned(u64::MAX)))
        );
        assert_eq!(
            node.to_json(),
            serde_json::json!({"maximum": u64::MAX, "minimum": i64::MIN})
        );

        let node = Node::from_json_str(r#"{"maximum": 18446744073709551615}"#).unwrap();
        assert_eq!(node.to_json()["maximum"], serde_json::json!(u64::MAX));
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(Node::from_yaml_str("a: [unclosed").is_err());
    }
}
