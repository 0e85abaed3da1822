//! Domain models for requirement declaration and validation.
//!
//! This module contains the value model, the requirement declarations, the
//! relation graph and the forest derived from it.

mod bounds;
pub use bounds::{BoundsError, CollectionInfo, SetRestrictionInfo};

/// The closed set of value kinds.
pub mod value;
pub use value::{FromValue, Value, ValueKind};

mod requirement_type;
pub use requirement_type::RequirementType;

/// Requirement declarations and per-value validation.
pub mod requirement;
pub use requirement::{DeclarationError, DependencyView, Requirement, RequirementBuilder};

pub mod relations;
pub use relations::{RelationError, RelationKind, RequirementRelations};

pub mod forest;
pub use forest::{ForestError, RequirementForest, RequirementTree, TreeNode};

mod requirement_set;
pub use requirement_set::{RequirementSet, RequirementSetBuilder, RequirementSetError};

mod builder;
pub use builder::ConfigurationBuilder;

mod configuration;
pub use configuration::{BindingKey, Configuration, Lookup};

pub mod violation;
pub use violation::{RequirementRef, ValidationErrors, Violation, ViolationKind};
