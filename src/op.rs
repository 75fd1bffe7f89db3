//! Operation model: parameter values, operations and undo-granular action specs.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Parameters of one operation, keyed by parameter name.
pub type Params = BTreeMap<String, Value>;

/// A parameter value.
///
/// Mappings are string-to-string and keep the caller's insertion order, which
/// both the engine and the generated code follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Str(String),
    /// Ordered list.
    List(Vec<Value>),
    /// String-keyed mapping of strings.
    Map(IndexMap<String, String>),
}

impl Value {
    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "mapping",
        }
    }

    /// Returns the text if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Builds a list of strings.
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Str(s.into())).collect())
    }

    /// Builds a string mapping.
    pub fn mapping<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

/// One named, parameterized call into the action registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Registered action name.
    #[serde(alias = "action")]
    pub name: String,
    /// Parameters by name.
    #[serde(default, alias = "params")]
    pub parameters: Params,
}

impl Operation {
    /// Creates an operation with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Params::new(),
        }
    }

    /// Adds one parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// One undo/redo step: a human-readable intent and its operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Label shown in history and emitted as a comment in generated code.
    pub intent: String,
    /// Operations applied in order.
    pub operations: Vec<Operation>,
}

impl ActionSpec {
    /// Creates a step holding a single operation.
    pub fn single(intent: impl Into<String>, operation: Operation) -> Self {
        Self {
            intent: intent.into(),
            operations: vec![operation],
        }
    }

    /// A step with no operations.
    pub fn empty(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            operations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wire_shape_with_aliases() {
        let spec: ActionSpec = serde_json::from_str(
            r#"{"intent":"Filter adults","operations":[{"action":"filter_rows","params":{"column":"age","operator":">","value":18}}]}"#,
        )
        .expect("decode");
        let op = &spec.operations[0];
        assert_eq!(op.name, "filter_rows");
        assert_eq!(op.parameters["value"], Value::Int(18));
        assert_eq!(op.parameters["operator"], Value::from(">"));
    }

    #[test]
    fn untagged_values_keep_their_runtime_type() {
        let v: Value = serde_json::from_str("2.0").expect("float");
        assert_eq!(v, Value::Float(2.0));
        let v: Value = serde_json::from_str("true").expect("bool");
        assert_eq!(v, Value::Bool(true));
        let v: Value = serde_json::from_str(r#"{"Salary":"mean"}"#).expect("map");
        assert_eq!(v, Value::mapping([("Salary", "mean")]));
        let v: Value = serde_json::from_str(r#"{"Salary":"mean","Age":"max"}"#).expect("ordered map");
        let Value::Map(map) = v else { panic!("expected a mapping") };
        assert_eq!(map.keys().collect::<Vec<_>>(), ["Salary", "Age"]);
        let v: Value = serde_json::from_str(r#"["a", 1]"#).expect("list");
        assert_eq!(v, Value::List(vec![Value::from("a"), Value::Int(1)]));
    }
}
