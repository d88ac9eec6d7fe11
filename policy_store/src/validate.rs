use policy_schema::PolicyState;

/// A cross-field validation rule.
///
/// Rules are total: they attach `error` messages to offending parameters
/// and report validity, but they never fail and never block further edits.
pub trait PolicyRule {
    fn apply(&self, state: &mut PolicyState) -> bool;
}

/// Adapter so deployments can supply ad-hoc rules as closures.
pub struct RuleFn<F>(pub F);

impl<F> PolicyRule for RuleFn<F>
where
    F: Fn(&mut PolicyState) -> bool,
{
    fn apply(&self, state: &mut PolicyState) -> bool {
        (self.0)(state)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub state: PolicyState,
    pub is_valid: bool,
}

/// Clear every parameter's error, then apply each rule in order. Validity
/// is the conjunction of the rule results.
pub fn validate(state: &PolicyState, rules: &[Box<dyn PolicyRule>]) -> ValidationOutcome {
    let mut next = state.clone();
    for parameter in next.iter_mut() {
        parameter.error = None;
    }
    let mut is_valid = true;
    for rule in rules {
        is_valid = rule.apply(&mut next) && is_valid;
    }
    ValidationOutcome {
        state: next,
        is_valid,
    }
}

/// Two named threshold parameters must not be equal. The built-in rule the
/// UK deployment ships for the higher and additional rate thresholds.
#[derive(Debug, Clone)]
pub struct DistinctThresholds {
    pub first: String,
    pub second: String,
}

impl DistinctThresholds {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    fn label(state: &PolicyState, name: &str) -> String {
        state
            .get(name)
            .and_then(|parameter| parameter.label.clone())
            .unwrap_or_else(|| name.to_string())
            .to_lowercase()
    }
}

impl PolicyRule for DistinctThresholds {
    fn apply(&self, state: &mut PolicyState) -> bool {
        let equal = match (state.get(&self.first), state.get(&self.second)) {
            (Some(first), Some(second)) => first.value == second.value,
            // A deployment without one of the thresholds has nothing to check.
            _ => false,
        };
        if !equal {
            return true;
        }
        let first_label = Self::label(state, &self.first);
        let second_label = Self::label(state, &self.second);
        if let Some(first) = state.get_mut(&self.first) {
            first.error = Some(format!(
                "The {first_label} must be different than the {second_label}."
            ));
        }
        if let Some(second) = state.get_mut(&self.second) {
            second.error = Some(format!(
                "The {second_label} must be different than the {first_label}."
            ));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{update_and_validate, update_parameter};
    use policy_schema::ParamValue;

    fn rules() -> Vec<Box<dyn PolicyRule>> {
        vec![Box::new(DistinctThresholds::new(
            "higher_threshold",
            "add_threshold",
        ))]
    }

    #[test]
    fn equal_thresholds_error_both_parameters() {
        let state = update_parameter(
            &PolicyState::builtin(),
            "higher_threshold",
            ParamValue::Number(150000.0),
        )
        .unwrap();
        let outcome = validate(&state, &rules());
        assert!(!outcome.is_valid);
        let higher = outcome.state.get("higher_threshold").unwrap();
        let additional = outcome.state.get("add_threshold").unwrap();
        assert_eq!(
            higher.error.as_deref(),
            Some("The higher rate threshold must be different than the additional rate threshold.")
        );
        assert!(additional.error.is_some());
    }

    #[test]
    fn diverging_the_thresholds_clears_both_errors() {
        let state = update_parameter(
            &PolicyState::builtin(),
            "higher_threshold",
            ParamValue::Number(150000.0),
        )
        .unwrap();
        let invalid = validate(&state, &rules());
        assert!(!invalid.is_valid);

        let outcome = update_and_validate(
            &invalid.state,
            "higher_threshold",
            ParamValue::Number(60000.0),
            &rules(),
        )
        .unwrap();
        assert!(outcome.is_valid);
        assert!(outcome.state.get("higher_threshold").unwrap().error.is_none());
        assert!(outcome.state.get("add_threshold").unwrap().error.is_none());
    }

    #[test]
    fn validation_is_total_with_missing_parameters() {
        let rules: Vec<Box<dyn PolicyRule>> =
            vec![Box::new(DistinctThresholds::new("ghost_a", "ghost_b"))];
        let outcome = validate(&PolicyState::builtin(), &rules);
        assert!(outcome.is_valid);
    }

    #[test]
    fn closures_work_as_rules() {
        let rules: Vec<Box<dyn PolicyRule>> = vec![Box::new(RuleFn(|state: &mut PolicyState| {
            if let Some(parameter) = state.get_mut("basic_rate") {
                if parameter.value.as_number().unwrap_or(0.0) > 0.9 {
                    parameter.error = Some("The basic rate cannot exceed 90%.".to_string());
                    return false;
                }
            }
            true
        }))];
        let state =
            update_parameter(&PolicyState::builtin(), "basic_rate", ParamValue::Number(0.95))
                .unwrap();
        let outcome = validate(&state, &rules);
        assert!(!outcome.is_valid);
        assert!(outcome.state.get("basic_rate").unwrap().error.is_some());
    }
}
