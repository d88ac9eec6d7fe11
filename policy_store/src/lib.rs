//! The policy state store: immutable single-field updates, pluggable
//! cross-field validation, and the query-string diff codec that backs
//! shareable reform links.
//!
//! Every mutation produces a new [`policy_schema::PolicyState`] value; the
//! caller's copy is never aliased into.

mod codec;
mod store;
mod validate;

pub use codec::{deserialize_query, serialize_query, CodecConfig, DecodeReport, MalformedKey};
pub use store::{update_and_validate, update_baseline, update_parameter, StoreError};
pub use validate::{validate, DistinctThresholds, PolicyRule, RuleFn, ValidationOutcome};
