use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Variables for one entity instance: variable name to per-period value
/// (either a bare value or a `{period: value}` object).
pub type EntityInstance = BTreeMap<String, Value>;

/// A simulated household: entity type -> instance name -> variables.
///
/// All update operations return a new `Situation`; the stored value is never
/// aliased into by callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Situation {
    #[serde(flatten)]
    entities: BTreeMap<String, BTreeMap<String, EntityInstance>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SituationError {
    #[error("no entity type named {entity_type} in the situation")]
    UnknownEntityType { entity_type: String },
    #[error("no {entity_type} instance named {name}")]
    UnknownInstance { entity_type: String, name: String },
}

impl Situation {
    /// An empty situation with the deployment's entity groups pre-created,
    /// e.g. `["people", "benunits", "households"]`.
    pub fn with_entity_types(entity_types: &[&str]) -> Self {
        let entities = entity_types
            .iter()
            .map(|entity_type| (entity_type.to_string(), BTreeMap::new()))
            .collect();
        Self { entities }
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn instance_names(&self, entity_type: &str) -> Vec<&str> {
        self.entities
            .get(entity_type)
            .map(|instances| instances.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn instance(&self, entity_type: &str, name: &str) -> Option<&EntityInstance> {
        self.entities.get(entity_type)?.get(name)
    }

    pub fn add_instance(
        &self,
        entity_type: &str,
        name: &str,
        variables: EntityInstance,
    ) -> Result<Situation, SituationError> {
        let mut next = self.clone();
        let instances = next.entities.get_mut(entity_type).ok_or_else(|| {
            SituationError::UnknownEntityType {
                entity_type: entity_type.to_string(),
            }
        })?;
        instances.insert(name.to_string(), variables);
        Ok(next)
    }

    pub fn remove_instance(
        &self,
        entity_type: &str,
        name: &str,
    ) -> Result<Situation, SituationError> {
        let mut next = self.clone();
        let instances = next.entities.get_mut(entity_type).ok_or_else(|| {
            SituationError::UnknownEntityType {
                entity_type: entity_type.to_string(),
            }
        })?;
        if instances.remove(name).is_none() {
            return Err(SituationError::UnknownInstance {
                entity_type: entity_type.to_string(),
                name: name.to_string(),
            });
        }
        Ok(next)
    }

    /// Set one variable on one instance, optionally under a period key.
    pub fn set_variable(
        &self,
        entity_type: &str,
        name: &str,
        variable: &str,
        period: Option<&str>,
        value: Value,
    ) -> Result<Situation, SituationError> {
        let mut next = self.clone();
        let instance = next
            .entities
            .get_mut(entity_type)
            .ok_or_else(|| SituationError::UnknownEntityType {
                entity_type: entity_type.to_string(),
            })?
            .get_mut(name)
            .ok_or_else(|| SituationError::UnknownInstance {
                entity_type: entity_type.to_string(),
                name: name.to_string(),
            })?;
        let stored = match period {
            Some(period) => json!({ period: value }),
            None => value,
        };
        instance.insert(variable.to_string(), stored);
        Ok(next)
    }

    /// The JSON body posted to the calculate endpoint.
    pub fn to_json_body(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Situation {
        Situation::with_entity_types(&["people", "benunits", "households"])
    }

    #[test]
    fn add_instance_leaves_original_untouched() {
        let situation = base();
        let with_child = situation
            .add_instance("people", "child_1", EntityInstance::new())
            .unwrap();
        assert!(situation.instance_names("people").is_empty());
        assert_eq!(with_child.instance_names("people"), vec!["child_1"]);
    }

    #[test]
    fn unknown_entity_type_is_an_error() {
        let err = base()
            .add_instance("pets", "rex", EntityInstance::new())
            .unwrap_err();
        assert_eq!(
            err,
            SituationError::UnknownEntityType {
                entity_type: "pets".to_string()
            }
        );
    }

    #[test]
    fn set_variable_with_period_nests_the_value() {
        let situation = base()
            .add_instance("people", "adult_1", EntityInstance::new())
            .unwrap()
            .set_variable("people", "adult_1", "employment_income", Some("2022"), json!(30000))
            .unwrap();
        assert_eq!(
            situation.instance("people", "adult_1").unwrap()["employment_income"],
            json!({ "2022": 30000 })
        );
    }

    #[test]
    fn remove_missing_instance_is_an_error() {
        let err = base().remove_instance("people", "ghost").unwrap_err();
        assert!(matches!(err, SituationError::UnknownInstance { .. }));
    }

    #[test]
    fn json_body_flattens_entity_groups() {
        let situation = base();
        let body = situation.to_json_body();
        assert!(body.get("people").is_some());
        assert!(body.get("households").is_some());
    }
}
