use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a policy lever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ValueType {
    #[default]
    #[serde(alias = "float", alias = "int")]
    Number,
    #[serde(alias = "bool")]
    Bool,
    #[serde(alias = "Key")]
    Enum,
}

/// A parameter value as it appears in API payloads: a bare number, a
/// boolean, or an enum key string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Key(String),
}

impl Default for ParamValue {
    fn default() -> Self {
        ParamValue::Number(0.0)
    }
}

impl ParamValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            ParamValue::Number(_) => ValueType::Number,
            ParamValue::Bool(_) => ValueType::Bool,
            ParamValue::Key(_) => ValueType::Enum,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            ParamValue::Key(key) => Some(key),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Key(value.to_string())
    }
}

/// An allowed key for an enum-typed parameter, with its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PossibleValue {
    pub key: String,
    #[serde(rename = "value")]
    pub label: String,
}

/// A single editable policy lever.
///
/// `default_value` is the canonical field name; payloads spelling it
/// `default` or `defaultValue` are accepted. `baseline_value` is only
/// populated by deployments that let the user edit the comparison baseline
/// as well as the reform; when absent the baseline is the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Parameter {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "valueType")]
    pub value_type: ValueType,
    pub value: ParamValue,
    #[serde(rename = "defaultValue", alias = "default")]
    pub default_value: ParamValue,
    #[serde(rename = "baselineValue", skip_serializing_if = "Option::is_none")]
    pub baseline_value: Option<ParamValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(rename = "possibleValues", skip_serializing_if = "Vec::is_empty")]
    pub possible_values: Vec<PossibleValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Cross-field validation message. Runtime-only, never on the wire.
    #[serde(skip)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Parameter {
    /// A parameter participates in the reform iff its value differs from
    /// its default.
    pub fn is_active(&self) -> bool {
        self.value != self.default_value
    }

    /// Effective comparison baseline: the explicit baseline value when one
    /// is set, the default otherwise.
    pub fn baseline(&self) -> &ParamValue {
        self.baseline_value.as_ref().unwrap_or(&self.default_value)
    }

    /// Unit tag `/1` marks a fractional rate (serialized as a percentage).
    pub fn is_fractional_rate(&self) -> bool {
        self.unit.as_deref() == Some("/1")
    }

    pub fn allows_key(&self, key: &str) -> bool {
        self.possible_values.is_empty()
            || self.possible_values.iter().any(|entry| entry.key == key)
    }
}

/// JSON Schema for the `/parameters` payload shape, for deployments that
/// want to validate a country package's response.
pub fn parameters_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(Vec<Parameter>)
}
