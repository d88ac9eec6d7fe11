//! Data model for the policy client core: parameter catalogs, policy state,
//! and household situations, plus the payload shapes exchanged with the
//! simulation API.

mod parameter;
mod policy;
mod situation;

pub use parameter::{parameters_schema, ParamValue, Parameter, PossibleValue, ValueType};
pub use policy::{PolicyCatalogError, PolicyState, BUILTIN_DEFAULT_PARAMETERS};
pub use situation::{EntityInstance, Situation, SituationError};
