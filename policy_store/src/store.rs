use policy_schema::{ParamValue, PolicyState, ValueType};
use thiserror::Error;

use crate::validate::{validate, PolicyRule, ValidationOutcome};

/// Error from a single-field update. The input state is untouched on error.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("no parameter named {name} in the policy")]
    ParameterNotFound { name: String },
    #[error("parameter {name} expects a {expected:?} value, got {got:?}")]
    ValueTypeMismatch {
        name: String,
        expected: ValueType,
        got: ValueType,
    },
    #[error("{key} is not a possible value of parameter {name}")]
    UnknownEnumKey { name: String, key: String },
}

fn checked(state: &PolicyState, name: &str, value: &ParamValue) -> Result<(), StoreError> {
    let parameter = state
        .get(name)
        .ok_or_else(|| StoreError::ParameterNotFound {
            name: name.to_string(),
        })?;
    let expected = parameter.default_value.value_type();
    if value.value_type() != expected {
        return Err(StoreError::ValueTypeMismatch {
            name: name.to_string(),
            expected,
            got: value.value_type(),
        });
    }
    if let ParamValue::Key(key) = value {
        if !parameter.allows_key(key) {
            return Err(StoreError::UnknownEnumKey {
                name: name.to_string(),
                key: key.clone(),
            });
        }
    }
    Ok(())
}

/// Set one parameter's reform value, returning the updated state.
pub fn update_parameter(
    state: &PolicyState,
    name: &str,
    value: ParamValue,
) -> Result<PolicyState, StoreError> {
    checked(state, name, &value)?;
    let mut next = state.clone();
    if let Some(parameter) = next.get_mut(name) {
        parameter.value = value;
    }
    Ok(next)
}

/// Set one parameter's baseline value, returning the updated state.
pub fn update_baseline(
    state: &PolicyState,
    name: &str,
    value: ParamValue,
) -> Result<PolicyState, StoreError> {
    checked(state, name, &value)?;
    let mut next = state.clone();
    if let Some(parameter) = next.get_mut(name) {
        parameter.baseline_value = Some(value);
    }
    Ok(next)
}

/// Update then revalidate, the per-edit flow the form layer drives.
pub fn update_and_validate(
    state: &PolicyState,
    name: &str,
    value: ParamValue,
    rules: &[Box<dyn PolicyRule>],
) -> Result<ValidationOutcome, StoreError> {
    let updated = update_parameter(state, name, value)?;
    Ok(validate(&updated, rules))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_changes_exactly_one_value() {
        let defaults = PolicyState::builtin();
        let updated = update_parameter(&defaults, "basic_rate", ParamValue::Number(0.25)).unwrap();
        for parameter in updated.iter() {
            let before = defaults.get(&parameter.name).unwrap();
            if parameter.name == "basic_rate" {
                assert_eq!(parameter.value, ParamValue::Number(0.25));
            } else {
                assert_eq!(parameter.value, before.value);
            }
            assert_eq!(parameter.default_value, before.default_value);
            assert_eq!(parameter.error, before.error);
        }
        // The input state is a value; the caller's copy is untouched.
        assert_eq!(
            defaults.get("basic_rate").unwrap().value,
            ParamValue::Number(0.2)
        );
    }

    #[test]
    fn unknown_parameter_is_an_error() {
        let defaults = PolicyState::builtin();
        let err = update_parameter(&defaults, "doesNotExist", ParamValue::Number(1.0)).unwrap_err();
        assert_eq!(
            err,
            StoreError::ParameterNotFound {
                name: "doesNotExist".to_string()
            }
        );
        assert_eq!(defaults, PolicyState::builtin());
    }

    #[test]
    fn value_type_must_match_the_declaration() {
        let defaults = PolicyState::builtin();
        let err = update_parameter(&defaults, "basic_rate", ParamValue::Bool(true)).unwrap_err();
        assert_eq!(
            err,
            StoreError::ValueTypeMismatch {
                name: "basic_rate".to_string(),
                expected: ValueType::Number,
                got: ValueType::Bool,
            }
        );
    }

    #[test]
    fn enum_updates_must_name_a_possible_value() {
        let defaults = PolicyState::builtin();
        let err =
            update_parameter(&defaults, "ubi_phase_out", ParamValue::from("banked")).unwrap_err();
        assert_eq!(
            err,
            StoreError::UnknownEnumKey {
                name: "ubi_phase_out".to_string(),
                key: "banked".to_string(),
            }
        );
        let updated =
            update_parameter(&defaults, "ubi_phase_out", ParamValue::from("tapered")).unwrap();
        assert!(updated.get("ubi_phase_out").unwrap().is_active());
    }

    #[test]
    fn baseline_update_leaves_the_reform_value_alone() {
        let defaults = PolicyState::builtin();
        let updated = update_baseline(&defaults, "basic_rate", ParamValue::Number(0.22)).unwrap();
        let rate = updated.get("basic_rate").unwrap();
        assert_eq!(rate.value, ParamValue::Number(0.2));
        assert_eq!(rate.baseline_value, Some(ParamValue::Number(0.22)));
        assert_eq!(rate.baseline(), &ParamValue::Number(0.22));
    }
}
