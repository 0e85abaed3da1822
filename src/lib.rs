//! Declarative configuration requirements.
//!
//! A [`RequirementSet`] declares what a configuration needs: typed
//! requirements with optionality, cardinality and allowed-value rules, related
//! by dependency and mutual exclusivity. A [`ConfigurationBuilder`] binds values
//! against the set and validates them into an immutable [`Configuration`],
//! reporting every violation at once.

pub mod domain;
pub use domain::{
    BindingKey, CollectionInfo, Configuration, ConfigurationBuilder, Lookup, RelationKind,
    Requirement, RequirementSet, RequirementType, SetRestrictionInfo, ValidationErrors, Value,
    ValueKind, Violation,
};

/// Encoding, persistence records and TOML manifests.
pub mod storage;
pub use storage::{BindingRecord, BindingsFile, Manifest};
