//! Validation-phase diagnostics.
//!
//! Validation never stops at the first problem. Every [`Violation`] found is
//! collected into a [`ValidationErrors`] so that a caller can report all of
//! them in a single round trip.

use std::fmt;

use nonempty::NonEmpty;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Requirement, Value, ValueKind};

/// A reference to a requirement, carried by diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RequirementRef {
    /// The requirement's stable identity.
    pub id: Uuid,
    /// The requirement's name.
    pub name: String,
}

impl From<&Requirement> for RequirementRef {
    fn from(requirement: &Requirement) -> Self {
        Self {
            id: requirement.id(),
            name: requirement.name().to_string(),
        }
    }
}

impl fmt::Display for RequirementRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "'{}'", self.name)
    }
}

/// Broad classification of a [`Violation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The bound value has the wrong kind.
    TypeMismatch,
    /// Too few or too many values.
    Cardinality,
    /// A value outside the allowed set, or outside its occurrence range.
    SetMembership,
    /// A missing dependency or a conflicting exclusivity.
    Relation,
    /// A duplicate, unknown or missing binding.
    Structural,
    /// Rejected by the requirement's own validator.
    Custom,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Self::TypeMismatch => "type mismatch",
            Self::Cardinality => "cardinality",
            Self::SetMembership => "set membership",
            Self::Relation => "relation",
            Self::Structural => "structural",
            Self::Custom => "custom",
        };
        f.write_str(label)
    }
}

/// A single problem found while validating bindings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// The value does not conform to the requirement's type.
    #[error("{requirement} expects a value of type {expected}, got {found}")]
    WrongType {
        /// The requirement.
        requirement: RequirementRef,
        /// The kind the requirement accepts.
        expected: ValueKind,
        /// A description of the kind that was supplied.
        found: String,
    },

    /// The collection has fewer elements than allowed.
    #[error("{requirement} needs at least {minimum} values, got {count}")]
    MinimumCountNotMet {
        /// The requirement.
        requirement: RequirementRef,
        /// The minimum number of elements.
        minimum: usize,
        /// The number of elements supplied.
        count: usize,
    },

    /// The collection has more elements than allowed.
    #[error("{requirement} accepts at most {maximum} values, got {count}")]
    MaximumCountExceeded {
        /// The requirement.
        requirement: RequirementRef,
        /// The maximum number of elements.
        maximum: usize,
        /// The number of elements supplied.
        count: usize,
    },

    /// The value is not one of the allowed values.
    #[error("{value} is not an allowed value for {requirement}")]
    ValueNotInSet {
        /// The requirement.
        requirement: RequirementRef,
        /// The offending value.
        value: Value,
    },

    /// An allowed value occurs fewer times than required.
    #[error("{value} must appear at least {minimum} times in {requirement}, found {count}")]
    ValueBelowMinimumTimesThreshold {
        /// The requirement.
        requirement: RequirementRef,
        /// The allowed value.
        value: Value,
        /// The minimum number of occurrences.
        minimum: usize,
        /// The number of occurrences found.
        count: usize,
    },

    /// An allowed value occurs more times than permitted.
    #[error("{value} may appear at most {maximum} times in {requirement}, found {count}")]
    ValueAboveMaximumTimesThreshold {
        /// The requirement.
        requirement: RequirementRef,
        /// The allowed value.
        value: Value,
        /// The maximum number of occurrences.
        maximum: usize,
        /// The number of occurrences found.
        count: usize,
    },

    /// The requirement's custom validator rejected the value.
    #[error("{requirement} rejected the value: {message}")]
    Rejected {
        /// The requirement.
        requirement: RequirementRef,
        /// The message supplied by the validator.
        message: String,
    },

    /// A non-optional requirement has no binding.
    #[error("required requirement {requirement} is not bound")]
    MissingRequiredRequirement {
        /// The requirement.
        requirement: RequirementRef,
    },

    /// Two mutually exclusive requirements are both bound.
    #[error("{requirement} and {other} are mutually exclusive but both are bound")]
    ConflictingExclusiveRequirements {
        /// The first requirement, in declaration order.
        requirement: RequirementRef,
        /// The second requirement.
        other: RequirementRef,
    },

    /// A bound requirement is missing some of its dependencies.
    #[error("{requirement} depends on unbound requirements: {}", join(.missing))]
    DependenciesNotSatisfied {
        /// The dependent requirement.
        requirement: RequirementRef,
        /// The dependencies that are not bound.
        missing: Vec<RequirementRef>,
    },

    /// The same requirement was bound twice.
    #[error("{requirement} is already bound")]
    DuplicateRequirement {
        /// The requirement.
        requirement: RequirementRef,
    },

    /// A binding names a requirement outside of the requirement set.
    #[error("unknown requirement '{key}'")]
    UnknownRequirement {
        /// The id or name that could not be resolved.
        key: String,
    },
}

fn join(requirements: &[RequirementRef]) -> String {
    requirements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Violation {
    /// The broad classification of this violation.
    #[must_use]
    pub const fn kind(&self) -> ViolationKind {
        match self {
            Self::WrongType { .. } => ViolationKind::TypeMismatch,
            Self::MinimumCountNotMet { .. } | Self::MaximumCountExceeded { .. } => {
                ViolationKind::Cardinality
            }
            Self::ValueNotInSet { .. }
            | Self::ValueBelowMinimumTimesThreshold { .. }
            | Self::ValueAboveMaximumTimesThreshold { .. } => ViolationKind::SetMembership,
            Self::Rejected { .. } => ViolationKind::Custom,
            Self::ConflictingExclusiveRequirements { .. }
            | Self::DependenciesNotSatisfied { .. } => ViolationKind::Relation,
            Self::MissingRequiredRequirement { .. }
            | Self::DuplicateRequirement { .. }
            | Self::UnknownRequirement { .. } => ViolationKind::Structural,
        }
    }

    /// The requirement this violation is about, if it could be resolved.
    #[must_use]
    pub const fn requirement(&self) -> Option<&RequirementRef> {
        match self {
            Self::WrongType { requirement, .. }
            | Self::MinimumCountNotMet { requirement, .. }
            | Self::MaximumCountExceeded { requirement, .. }
            | Self::ValueNotInSet { requirement, .. }
            | Self::ValueBelowMinimumTimesThreshold { requirement, .. }
            | Self::ValueAboveMaximumTimesThreshold { requirement, .. }
            | Self::Rejected { requirement, .. }
            | Self::MissingRequiredRequirement { requirement }
            | Self::ConflictingExclusiveRequirements { requirement, .. }
            | Self::DependenciesNotSatisfied { requirement, .. }
            | Self::DuplicateRequirement { requirement } => Some(requirement),
            Self::UnknownRequirement { .. } => None,
        }
    }
}

/// A non-empty collection of violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(NonEmpty<Violation>);

impl ValidationErrors {
    /// Wrap a list of violations, or `None` if the list is empty.
    #[must_use]
    pub fn from_vec(violations: Vec<Violation>) -> Option<Self> {
        NonEmpty::from_vec(violations).map(Self)
    }

    /// A single violation.
    #[must_use]
    pub const fn single(violation: Violation) -> Self {
        Self(NonEmpty::new(violation))
    }

    /// Iterate over the violations in the order they were found.
    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// The number of violations. Always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with collections.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// The first violation found.
    #[must_use]
    pub const fn first(&self) -> &Violation {
        self.0.first()
    }

    /// Append the violations of `other`.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(Vec::from(other.0));
    }

    /// Consume into a plain vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<Violation> {
        Vec::from(self.0)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let count = self.len();
        write!(
            f,
            "{count} validation error{}",
            if count == 1 { "" } else { "s" }
        )?;
        for violation in self.iter() {
            write!(f, "\n  - {violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Collects violations, and turns them into a result at the end.
#[derive(Debug, Default)]
pub(crate) struct Collector(Vec<Violation>);

impl Collector {
    pub(crate) fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    pub(crate) fn absorb(&mut self, errors: ValidationErrors) {
        self.0.extend(errors.into_vec());
    }

    pub(crate) fn finish(self) -> Result<(), ValidationErrors> {
        ValidationErrors::from_vec(self.0).map_or(Ok(()), Err)
    }
}
