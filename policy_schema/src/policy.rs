use std::{
    fs, io,
    path::{Path, PathBuf},
};

use ahash::AHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map as JsonMap, Value};
use thiserror::Error;

use crate::parameter::Parameter;

pub const BUILTIN_DEFAULT_PARAMETERS: &str = include_str!("data/default_parameters.json");

/// The authoritative in-memory policy: every parameter the deployment
/// exposes, in insertion order, with a name index for lookup.
///
/// Created once from a `/parameters` payload (or the builtin sample) at
/// application start and held for the life of the session.
#[derive(Debug, Clone, Default)]
pub struct PolicyState {
    parameters: Vec<Parameter>,
    index: AHashMap<String, usize>,
}

#[derive(Debug, Error)]
pub enum PolicyCatalogError {
    #[error("failed to parse parameter catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read parameter catalog from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("duplicate parameter name {name}")]
    Duplicate { name: String },
    #[error("parameter {name} mixes value types between value and default")]
    MixedTypes { name: String },
    #[error("no parameter named {name}")]
    Unknown { name: String },
}

impl PolicyState {
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN_DEFAULT_PARAMETERS)
            .expect("builtin parameter catalog should parse")
    }

    /// Build from an already-parsed list, checking the catalog invariants.
    pub fn from_parameters(parameters: Vec<Parameter>) -> Result<Self, PolicyCatalogError> {
        let mut index = AHashMap::with_capacity(parameters.len());
        for (position, parameter) in parameters.iter().enumerate() {
            if parameter.value.value_type() != parameter.default_value.value_type() {
                return Err(PolicyCatalogError::MixedTypes {
                    name: parameter.name.clone(),
                });
            }
            if index.insert(parameter.name.clone(), position).is_some() {
                return Err(PolicyCatalogError::Duplicate {
                    name: parameter.name.clone(),
                });
            }
        }
        Ok(Self { parameters, index })
    }

    /// Parse the array catalog form (the builtin data file layout).
    pub fn from_json_str(json: &str) -> Result<Self, PolicyCatalogError> {
        let parameters: Vec<Parameter> = serde_json::from_str(json)?;
        Self::from_parameters(parameters)
    }

    pub fn from_file(path: &Path) -> Result<Self, PolicyCatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| PolicyCatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse the `/parameters` payload form: an object keyed by parameter
    /// name. The key wins over any `name` field inside the entry.
    pub fn from_api_value(payload: Value) -> Result<Self, PolicyCatalogError> {
        let raw: JsonMap<String, Value> = serde_json::from_value(payload)?;
        let mut parameters = Vec::with_capacity(raw.len());
        for (name, entry) in raw {
            let mut parameter: Parameter = serde_json::from_value(entry)?;
            parameter.name = name;
            parameters.push(parameter);
        }
        Self::from_parameters(parameters)
    }

    pub fn from_api_json(json: &str) -> Result<Self, PolicyCatalogError> {
        Self::from_api_value(serde_json::from_str(json)?)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index
            .get(name)
            .map(|position| &self.parameters[*position])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        let position = *self.index.get(name)?;
        Some(&mut self.parameters[position])
    }

    /// Parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.parameters.iter_mut()
    }

    /// Parameters whose value differs from default, insertion order.
    pub fn active(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|entry| entry.is_active())
    }

    /// Overlay deployment-specific metadata onto one parameter, field by
    /// field (extra labels, bounds, units shipped outside the API payload).
    pub fn merge_metadata(
        &mut self,
        name: &str,
        metadata: &JsonMap<String, Value>,
    ) -> Result<(), PolicyCatalogError> {
        let position = *self
            .index
            .get(name)
            .ok_or_else(|| PolicyCatalogError::Unknown {
                name: name.to_string(),
            })?;
        let mut merged = match serde_json::to_value(&self.parameters[position])? {
            Value::Object(fields) => fields,
            _ => JsonMap::new(),
        };
        for (key, value) in metadata {
            merged.insert(key.clone(), value.clone());
        }
        self.parameters[position] = serde_json::from_value(Value::Object(merged))?;
        Ok(())
    }
}

impl PartialEq for PolicyState {
    fn eq(&self, other: &Self) -> bool {
        self.parameters == other.parameters
    }
}

impl Serialize for PolicyState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.parameters.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PolicyState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parameters = Vec::<Parameter>::deserialize(deserializer)?;
        Self::from_parameters(parameters).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{ParamValue, ValueType};

    #[test]
    fn builtin_catalog_parses() {
        let state = PolicyState::builtin();
        assert!(state.contains("basic_rate"));
        assert!(state.contains("higher_threshold"));
        assert_eq!(state.active().count(), 0);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = PolicyState::from_json_str(
            r#"[
                {"name": "a", "value": 1.0, "defaultValue": 1.0},
                {"name": "a", "value": 2.0, "defaultValue": 2.0}
            ]"#,
        );
        assert!(matches!(
            result,
            Err(PolicyCatalogError::Duplicate { name }) if name == "a"
        ));
    }

    #[test]
    fn mixed_value_and_default_types_are_rejected() {
        let result =
            PolicyState::from_json_str(r#"[{"name": "a", "value": 1.0, "defaultValue": true}]"#);
        assert!(matches!(result, Err(PolicyCatalogError::MixedTypes { .. })));
    }

    #[test]
    fn api_payload_keys_name_the_parameters() {
        let state = PolicyState::from_api_json(
            r#"{
                "basic_rate": {"value": 0.2, "default": 0.2, "unit": "/1", "valueType": "float"},
                "child_benefit": {"value": 21.15, "defaultValue": 21.15}
            }"#,
        )
        .unwrap();
        let rate = state.get("basic_rate").unwrap();
        assert_eq!(rate.name, "basic_rate");
        assert_eq!(rate.value_type, ValueType::Number);
        assert!(rate.is_fractional_rate());
        assert_eq!(
            state.get("child_benefit").unwrap().default_value,
            ParamValue::Number(21.15)
        );
    }

    #[test]
    fn merge_metadata_overlays_fields() {
        let mut state = PolicyState::builtin();
        let metadata: JsonMap<String, Value> =
            serde_json::from_str(r#"{"max": 2, "label": "Basic rate of income tax"}"#).unwrap();
        state.merge_metadata("basic_rate", &metadata).unwrap();
        let rate = state.get("basic_rate").unwrap();
        assert_eq!(rate.max, Some(2.0));
        assert_eq!(rate.label.as_deref(), Some("Basic rate of income tax"));
        assert!(state.merge_metadata("missing", &metadata).is_err());
    }

    #[test]
    fn state_round_trips_through_json() {
        let state = PolicyState::builtin();
        let encoded = serde_json::to_string(&state).unwrap();
        let decoded: PolicyState = serde_json::from_str(&encoded).unwrap();
        assert_eq!(state, decoded);
    }
}
