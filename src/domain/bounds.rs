//! Cardinality and occurrence bounds.
//!
//! Both [`CollectionInfo`] and [`SetRestrictionInfo`] validate their bounds at
//! construction, so an illegal bound can never reach a requirement.

use thiserror::Error;

use crate::domain::Value;

/// An illegal bound combination supplied to a constructor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundsError {
    /// A bound was outside of its legal range.
    #[error("{parameter} is out of range: {reason}")]
    OutOfRange {
        /// The name of the offending parameter.
        parameter: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Validates a `(minimum, maximum)` pair.
///
/// Counts are unsigned, so the minimum is non-negative by construction.
fn check_bounds(
    minimum: Option<usize>,
    maximum: Option<usize>,
    min_name: &'static str,
    max_name: &'static str,
) -> Result<(), BoundsError> {
    if maximum == Some(0) {
        return Err(BoundsError::OutOfRange {
            parameter: max_name,
            reason: "must be at least 1".to_string(),
        });
    }

    if let (Some(min), Some(max)) = (minimum, maximum) {
        if min > max {
            return Err(BoundsError::OutOfRange {
                parameter: min_name,
                reason: format!("{min} is greater than {max_name} {max}"),
            });
        }
    }

    Ok(())
}

/// Cardinality bound for a collection-valued requirement.
///
/// Equality and hashing are defined over the literal optional bounds: an absent
/// bound is only equal to another absent bound, never to a present one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CollectionInfo {
    minimum: Option<usize>,
    maximum: Option<usize>,
}

impl CollectionInfo {
    /// Create a new cardinality bound.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::OutOfRange`] if `maximum` is zero, or if
    /// `minimum` is greater than `maximum`.
    pub fn new(minimum: Option<usize>, maximum: Option<usize>) -> Result<Self, BoundsError> {
        check_bounds(minimum, maximum, "minimum", "maximum")?;
        Ok(Self { minimum, maximum })
    }

    /// A bound with both a minimum and a maximum.
    ///
    /// # Errors
    ///
    /// See [`CollectionInfo::new`].
    pub fn between(minimum: usize, maximum: usize) -> Result<Self, BoundsError> {
        Self::new(Some(minimum), Some(maximum))
    }

    /// The minimum number of elements, if bounded.
    #[must_use]
    pub const fn minimum(&self) -> Option<usize> {
        self.minimum
    }

    /// The maximum number of elements, if bounded.
    #[must_use]
    pub const fn maximum(&self) -> Option<usize> {
        self.maximum
    }
}

/// One allowed value of a set-restricted requirement, with optional bounds on
/// how many times it may appear in a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SetRestrictionInfo {
    value: Value,
    minimum_times: Option<usize>,
    maximum_times: Option<usize>,
}

impl SetRestrictionInfo {
    /// Allow `value` with occurrence bounds.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::OutOfRange`] if `maximum_times` is zero, or if
    /// `minimum_times` is greater than `maximum_times`.
    pub fn new(
        value: impl Into<Value>,
        minimum_times: Option<usize>,
        maximum_times: Option<usize>,
    ) -> Result<Self, BoundsError> {
        check_bounds(
            minimum_times,
            maximum_times,
            "minimum_times",
            "maximum_times",
        )?;
        Ok(Self {
            value: value.into(),
            minimum_times,
            maximum_times,
        })
    }

    /// Allow `value` any number of times.
    #[must_use]
    pub fn allow(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            minimum_times: None,
            maximum_times: None,
        }
    }

    /// The allowed value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// The minimum number of occurrences, if bounded.
    #[must_use]
    pub const fn minimum_times(&self) -> Option<usize> {
        self.minimum_times
    }

    /// The maximum number of occurrences, if bounded.
    #[must_use]
    pub const fn maximum_times(&self) -> Option<usize> {
        self.maximum_times
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::hash_map::DefaultHasher,
        hash::{Hash, Hasher},
    };

    use test_case::test_case;

    use super::*;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test_case(None, None; "unbounded")]
    #[test_case(Some(0), None; "zero minimum")]
    #[test_case(None, Some(1); "unit maximum")]
    #[test_case(Some(0), Some(1); "zero to one")]
    #[test_case(Some(3), Some(3); "exact")]
    #[test_case(Some(2), Some(10); "range")]
    fn legal_collection_bounds_are_echoed(minimum: Option<usize>, maximum: Option<usize>) {
        let info = CollectionInfo::new(minimum, maximum).unwrap();
        assert_eq!(info.minimum(), minimum);
        assert_eq!(info.maximum(), maximum);
    }

    #[test_case(None, Some(0), "maximum"; "zero maximum")]
    #[test_case(Some(0), Some(0), "maximum"; "zero maximum with minimum")]
    #[test_case(Some(4), Some(3), "minimum"; "minimum above maximum")]
    fn illegal_collection_bounds_are_rejected(
        minimum: Option<usize>,
        maximum: Option<usize>,
        parameter: &str,
    ) {
        let error = CollectionInfo::new(minimum, maximum).unwrap_err();
        let BoundsError::OutOfRange { parameter: actual, .. } = error;
        assert_eq!(actual, parameter);
    }

    #[test_case(None, None, None, None, true; "both unbounded")]
    #[test_case(None, Some(3), None, Some(3), true; "same maximum")]
    #[test_case(Some(1), Some(3), Some(1), Some(3), true; "same pair")]
    #[test_case(None, Some(3), None, Some(5), false; "different maximum")]
    #[test_case(None, Some(3), Some(0), Some(3), false; "absent versus zero minimum")]
    #[test_case(Some(1), None, Some(1), Some(4), false; "absent versus present maximum")]
    #[test_case(Some(1), Some(4), Some(2), Some(4), false; "different minimum")]
    fn collection_equality_is_literal(
        min_a: Option<usize>,
        max_a: Option<usize>,
        min_b: Option<usize>,
        max_b: Option<usize>,
        equal: bool,
    ) {
        let a = CollectionInfo::new(min_a, max_a).unwrap();
        let b = CollectionInfo::new(min_b, max_b).unwrap();

        assert_eq!(a == b, equal);
        assert_eq!(b == a, equal);
        assert_eq!(a != b, !equal);
        if equal {
            assert_eq!(hash_of(&a), hash_of(&b));
        }
    }

    #[test]
    fn absent_and_zero_minimum_hash_differently() {
        let absent = CollectionInfo::new(None, Some(3)).unwrap();
        let zero = CollectionInfo::new(Some(0), Some(3)).unwrap();
        assert_ne!(hash_of(&absent), hash_of(&zero));
    }

    #[test_case(None, Some(0); "zero maximum")]
    #[test_case(Some(2), Some(1); "minimum above maximum")]
    fn illegal_occurrence_bounds_are_rejected(minimum: Option<usize>, maximum: Option<usize>) {
        assert!(SetRestrictionInfo::new("tcp", minimum, maximum).is_err());
    }

    #[test]
    fn set_restriction_equality_covers_value_and_bounds() {
        let a = SetRestrictionInfo::new("tcp", None, Some(2)).unwrap();
        let b = SetRestrictionInfo::new("tcp", None, Some(2)).unwrap();
        let c = SetRestrictionInfo::new("tcp", Some(0), Some(2)).unwrap();
        let d = SetRestrictionInfo::new("udp", None, Some(2)).unwrap();

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);
        assert_ne!(c, a);
        assert_ne!(a, d);

        let unbounded = SetRestrictionInfo::new("tcp", None, None).unwrap();
        assert_eq!(SetRestrictionInfo::allow("tcp"), unbounded);
    }
}
