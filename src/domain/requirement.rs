use std::{
    collections::HashSet,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use non_empty_string::NonEmptyString;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    violation::Collector, CollectionInfo, FromValue, RequirementType, SetRestrictionInfo,
    ValidationErrors, Value, Violation,
};

/// A custom validation rule attached to a requirement.
///
/// The rule receives the (already type- and set-checked) value together with
/// the validated bindings of the requirement's dependencies, and returns a
/// message when it rejects the value.
pub type ValidatorFn = dyn Fn(&Value, &DependencyView<'_>) -> Result<(), String> + Send + Sync;

/// A declared, typed, identified slot that a configuration may or must bind a
/// value to.
///
/// Requirements are immutable once built. Their relations to other
/// requirements are declared separately, in a
/// [`RequirementRelations`](crate::domain::RequirementRelations) graph.
#[derive(Clone)]
pub struct Requirement {
    id: Uuid,
    name: NonEmptyString,
    description: String,
    value_type: RequirementType,
    optional: bool,
    collection: Option<CollectionInfo>,
    allowed: Option<Vec<SetRestrictionInfo>>,
    validator: Option<Arc<ValidatorFn>>,
}

/// Errors raised while declaring a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    /// Requirement names must not be empty.
    #[error("requirement name must not be empty")]
    EmptyName,

    /// Cardinality bounds only apply to collection-valued types.
    #[error("requirement '{name}' has collection bounds but its type {kind} is not a collection")]
    CollectionBoundsOnScalar {
        /// The requirement name.
        name: String,
        /// The requirement's value kind.
        kind: String,
    },

    /// An allowed value does not match the type's element kind.
    #[error("allowed value {value} of requirement '{name}' does not match the element type {kind}")]
    AllowedValueWrongType {
        /// The requirement name.
        name: String,
        /// The offending value.
        value: Value,
        /// The element kind.
        kind: String,
    },

    /// The same value appears twice in the allowed set.
    #[error("allowed value {value} of requirement '{name}' is listed more than once")]
    DuplicateAllowedValue {
        /// The requirement name.
        name: String,
        /// The duplicated value.
        value: Value,
    },
}

impl Requirement {
    /// Start declaring a requirement with the given name and type.
    ///
    /// A new random UUID is used unless one is supplied with
    /// [`RequirementBuilder::id`].
    #[must_use]
    pub fn builder(
        name: impl Into<String>,
        requirement_type: RequirementType,
    ) -> RequirementBuilder {
        RequirementBuilder {
            id: None,
            name: name.into(),
            description: String::new(),
            value_type: requirement_type,
            optional: false,
            collection: None,
            allowed: None,
            validator: None,
        }
    }

    /// The unique, stable identifier of this requirement.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The human-readable name. Unique within a requirement set.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// A longer description of what the requirement is for.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The type of value this requirement accepts.
    #[must_use]
    pub const fn requirement_type(&self) -> &RequirementType {
        &self.value_type
    }

    /// Whether a configuration may leave this requirement unbound.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    /// The cardinality bounds, for collection-valued requirements.
    #[must_use]
    pub const fn collection(&self) -> Option<&CollectionInfo> {
        self.collection.as_ref()
    }

    /// The allowed values, if the requirement is set-restricted.
    #[must_use]
    pub fn allowed(&self) -> Option<&[SetRestrictionInfo]> {
        self.allowed.as_deref()
    }

    /// Whether a custom validator is attached.
    #[must_use]
    pub const fn has_validator(&self) -> bool {
        self.validator.is_some()
    }

    /// Validate a value against this requirement.
    ///
    /// Checks run in order: type compatibility, collection cardinality, set
    /// membership and occurrence counts, then the custom validator. A type
    /// mismatch stops further checks, and the custom validator only runs on a
    /// value that passed every other check. All other violations are
    /// collected.
    ///
    /// # Errors
    ///
    /// Returns every violation found.
    pub fn validate(
        &self,
        value: &Value,
        dependencies: &DependencyView<'_>,
    ) -> Result<(), ValidationErrors> {
        self.check_value(value)?;

        if let Some(validator) = &self.validator {
            validator(value, dependencies).map_err(|message| {
                ValidationErrors::single(Violation::Rejected {
                    requirement: self.into(),
                    message,
                })
            })?;
        }

        Ok(())
    }

    /// Run the rules that depend on nothing but the value itself.
    pub(crate) fn check_value(&self, value: &Value) -> Result<(), ValidationErrors> {
        let kind = self.value_type.kind();
        if !value.conforms_to(kind) {
            return Err(ValidationErrors::single(Violation::WrongType {
                requirement: self.into(),
                expected: kind.clone(),
                found: value.describe_kind(),
            }));
        }

        let mut collector = Collector::default();
        let is_collection = value.as_list().is_some();
        let elements = value
            .as_list()
            .unwrap_or_else(|| std::slice::from_ref(value));

        if let Some(collection) = &self.collection {
            self.check_cardinality(collection, elements.len(), &mut collector);
        }

        if let Some(allowed) = &self.allowed {
            self.check_membership(allowed, elements, is_collection, &mut collector);
        }

        collector.finish()
    }

    fn check_cardinality(
        &self,
        collection: &CollectionInfo,
        count: usize,
        collector: &mut Collector,
    ) {
        if let Some(minimum) = collection.minimum() {
            if count < minimum {
                collector.push(Violation::MinimumCountNotMet {
                    requirement: self.into(),
                    minimum,
                    count,
                });
            }
        }

        if let Some(maximum) = collection.maximum() {
            if count > maximum {
                collector.push(Violation::MaximumCountExceeded {
                    requirement: self.into(),
                    maximum,
                    count,
                });
            }
        }
    }

    fn check_membership(
        &self,
        allowed: &[SetRestrictionInfo],
        elements: &[Value],
        is_collection: bool,
        collector: &mut Collector,
    ) {
        let mut reported = HashSet::new();
        for element in elements {
            let known = allowed.iter().any(|info| info.value() == element);
            if !known && reported.insert(element) {
                collector.push(Violation::ValueNotInSet {
                    requirement: self.into(),
                    value: element.clone(),
                });
            }
        }

        // occurrence bounds are only meaningful across a collection
        if !is_collection {
            return;
        }

        for info in allowed {
            let count = elements.iter().filter(|e| *e == info.value()).count();

            if let Some(minimum) = info.minimum_times() {
                if count < minimum {
                    collector.push(Violation::ValueBelowMinimumTimesThreshold {
                        requirement: self.into(),
                        value: info.value().clone(),
                        minimum,
                        count,
                    });
                }
            }

            if let Some(maximum) = info.maximum_times() {
                if count > maximum {
                    collector.push(Violation::ValueAboveMaximumTimesThreshold {
                        requirement: self.into(),
                        value: info.value().clone(),
                        maximum,
                        count,
                    });
                }
            }
        }
    }
}

impl PartialEq for Requirement {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Requirement {}

impl Hash for Requirement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Requirement")
            .field("id", &self.id)
            .field("name", &self.name.as_str())
            .field("type", &self.value_type)
            .field("optional", &self.optional)
            .field("collection", &self.collection)
            .field("allowed", &self.allowed)
            .field("validator", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

/// Staged declaration of a [`Requirement`].
#[must_use]
pub struct RequirementBuilder {
    id: Option<Uuid>,
    name: String,
    description: String,
    value_type: RequirementType,
    optional: bool,
    collection: Option<CollectionInfo>,
    allowed: Option<Vec<SetRestrictionInfo>>,
    validator: Option<Arc<ValidatorFn>>,
}

impl RequirementBuilder {
    /// Use a fixed identity instead of a random one.
    pub const fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the requirement as optional.
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Set whether the requirement is optional.
    pub const fn set_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Bound the number of elements of a collection-valued requirement.
    pub const fn collection(mut self, collection: CollectionInfo) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Add an allowed value.
    ///
    /// The first call turns the requirement into a set-restricted one.
    pub fn allow(mut self, info: SetRestrictionInfo) -> Self {
        self.allowed.get_or_insert_with(Vec::new).push(info);
        self
    }

    /// Attach a custom validator.
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value, &DependencyView<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Finish the declaration.
    ///
    /// # Errors
    ///
    /// Fails if the name is empty, if collection bounds are given for a scalar
    /// type, or if the allowed values do not match the element type or
    /// contain duplicates.
    pub fn build(self) -> Result<Requirement, DeclarationError> {
        let name = NonEmptyString::new(self.name).map_err(|_| DeclarationError::EmptyName)?;
        let kind = self.value_type.kind();

        if self.collection.is_some() && !kind.is_collection() {
            return Err(DeclarationError::CollectionBoundsOnScalar {
                name: name.to_string(),
                kind: kind.to_string(),
            });
        }

        if let Some(allowed) = &self.allowed {
            let element = kind.element();
            let mut seen = HashSet::new();
            for info in allowed {
                if !info.value().conforms_to(element) {
                    return Err(DeclarationError::AllowedValueWrongType {
                        name: name.to_string(),
                        value: info.value().clone(),
                        kind: element.to_string(),
                    });
                }
                if !seen.insert(info.value()) {
                    return Err(DeclarationError::DuplicateAllowedValue {
                        name: name.to_string(),
                        value: info.value().clone(),
                    });
                }
            }
        }

        Ok(Requirement {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            name,
            description: self.description,
            value_type: self.value_type,
            optional: self.optional,
            collection: self.collection,
            allowed: self.allowed,
            validator: self.validator,
        })
    }
}

/// The validated bindings of a requirement's dependencies.
///
/// Handed to custom validators so that cross-requirement rules can run.
#[derive(Debug, Clone, Default)]
pub struct DependencyView<'a> {
    bindings: Vec<(&'a Requirement, &'a Value)>,
}

impl<'a> DependencyView<'a> {
    pub(crate) const fn new(bindings: Vec<(&'a Requirement, &'a Value)>) -> Self {
        Self { bindings }
    }

    /// The value bound to a dependency.
    #[must_use]
    pub fn get(&self, requirement: &Requirement) -> Option<&'a Value> {
        self.bindings
            .iter()
            .find(|(r, _)| r.id() == requirement.id())
            .map(|(_, value)| *value)
    }

    /// The value bound to a dependency, looked up by name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&'a Value> {
        self.bindings
            .iter()
            .find(|(r, _)| r.name() == name)
            .map(|(_, value)| *value)
    }

    /// The strongly-typed value bound to a dependency, or `None` if it is
    /// unbound or of another type.
    #[must_use]
    pub fn get_as<T: FromValue>(&self, name: &str) -> Option<T> {
        self.get_by_name(name).and_then(T::from_value)
    }

    /// Iterate over the dependency bindings.
    pub fn iter(&self) -> impl Iterator<Item = (&'a Requirement, &'a Value)> + '_ {
        self.bindings.iter().copied()
    }

    /// The number of validated dependency bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no dependency is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValueKind;

    fn text(name: &str) -> RequirementBuilder {
        Requirement::builder(name, RequirementType::text())
    }

    fn check(requirement: &Requirement, value: impl Into<Value>) -> Vec<Violation> {
        requirement
            .validate(&value.into(), &DependencyView::default())
            .map_or_else(ValidationErrors::into_vec, |()| Vec::new())
    }

    #[test]
    fn accepts_matching_value() {
        let requirement = text("host").build().unwrap();
        assert!(check(&requirement, "example.com").is_empty());
    }

    #[test]
    fn wrong_type_stops_further_checks() {
        let requirement = Requirement::builder("ports", RequirementType::integer_list())
            .collection(CollectionInfo::between(2, 3).unwrap())
            .build()
            .unwrap();

        let violations = check(&requirement, "not a list");
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            &violations[0],
            Violation::WrongType { expected, found, .. }
                if *expected == ValueKind::list_of(ValueKind::Integer) && found == "text"
        ));
    }

    #[test]
    fn cardinality_is_checked_on_collections() {
        let requirement = Requirement::builder("ports", RequirementType::integer_list())
            .collection(CollectionInfo::between(2, 3).unwrap())
            .build()
            .unwrap();

        assert!(check(&requirement, vec![80, 443]).is_empty());
        assert!(matches!(
            check(&requirement, vec![80]).as_slice(),
            [Violation::MinimumCountNotMet { minimum: 2, count: 1, .. }]
        ));
        assert!(matches!(
            check(&requirement, vec![1, 2, 3, 4]).as_slice(),
            [Violation::MaximumCountExceeded { maximum: 3, count: 4, .. }]
        ));
    }

    #[test]
    fn scalar_outside_allowed_set_is_rejected() {
        let requirement = text("protocol")
            .allow(SetRestrictionInfo::allow("tcp"))
            .allow(SetRestrictionInfo::allow("udp"))
            .build()
            .unwrap();

        assert!(check(&requirement, "tcp").is_empty());
        assert!(matches!(
            check(&requirement, "icmp").as_slice(),
            [Violation::ValueNotInSet { value, .. }] if *value == "icmp"
        ));
    }

    #[test]
    fn occurrence_bounds_are_checked_across_collection() {
        let requirement = Requirement::builder("flags", RequirementType::text_list())
            .allow(SetRestrictionInfo::new("verbose", None, Some(1)).unwrap())
            .allow(SetRestrictionInfo::new("primary", Some(1), None).unwrap())
            .build()
            .unwrap();

        assert!(check(&requirement, vec!["primary", "verbose"]).is_empty());

        let violations = check(&requirement, vec!["verbose", "verbose", "bogus", "bogus"]);
        assert_eq!(violations.len(), 3, "{violations:?}");
        assert!(matches!(
            &violations[0],
            Violation::ValueNotInSet { value, .. } if *value == "bogus"
        ));
        assert!(matches!(
            &violations[1],
            Violation::ValueAboveMaximumTimesThreshold { maximum: 1, count: 2, .. }
        ));
        assert!(matches!(
            &violations[2],
            Violation::ValueBelowMinimumTimesThreshold { minimum: 1, count: 0, .. }
        ));
    }

    #[test]
    fn cardinality_and_membership_are_both_reported() {
        let requirement = Requirement::builder("flags", RequirementType::text_list())
            .collection(CollectionInfo::new(None, Some(1)).unwrap())
            .allow(SetRestrictionInfo::allow("a"))
            .build()
            .unwrap();

        let violations = check(&requirement, vec!["a", "b"]);
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn custom_validator_sees_dependencies() {
        let port = Requirement::builder("port", RequirementType::integer())
            .build()
            .unwrap();
        let host = text("host")
            .validator(|value, dependencies| {
                let port: i64 = dependencies.get_as("port").ok_or("port must be bound")?;
                if port == 22 && *value == "public.example.com" {
                    return Err("ssh must not be exposed publicly".to_string());
                }
                Ok(())
            })
            .build()
            .unwrap();

        let ssh = Value::from(22);
        let view = DependencyView::new(vec![(&port, &ssh)]);
        let error = host
            .validate(&Value::from("public.example.com"), &view)
            .unwrap_err();
        assert!(matches!(
            error.first(),
            Violation::Rejected { message, .. } if message == "ssh must not be exposed publicly"
        ));

        let none = DependencyView::default();
        assert!(host.validate(&Value::from("internal"), &view).is_ok());
        assert!(host.validate(&Value::from("internal"), &none).is_err());
    }

    #[test]
    fn custom_validator_skipped_when_value_invalid() {
        let requirement = text("name")
            .allow(SetRestrictionInfo::allow("a"))
            .validator(|_, _| Err("should not run".to_string()))
            .build()
            .unwrap();

        let violations = check(&requirement, "b");
        assert!(matches!(violations.as_slice(), [Violation::ValueNotInSet { .. }]));
    }

    #[test]
    fn declaration_rejects_inconsistent_rules() {
        assert_eq!(text("").build().unwrap_err(), DeclarationError::EmptyName);

        assert!(matches!(
            text("host")
                .collection(CollectionInfo::between(1, 2).unwrap())
                .build(),
            Err(DeclarationError::CollectionBoundsOnScalar { .. })
        ));

        assert!(matches!(
            text("host").allow(SetRestrictionInfo::allow(3)).build(),
            Err(DeclarationError::AllowedValueWrongType { .. })
        ));

        assert!(matches!(
            text("host")
                .allow(SetRestrictionInfo::allow("a"))
                .allow(SetRestrictionInfo::new("a", None, Some(2)).unwrap())
                .build(),
            Err(DeclarationError::DuplicateAllowedValue { .. })
        ));
    }

    #[test]
    fn equality_is_by_identity() {
        let id = Uuid::new_v4();
        let a = text("a").id(id).build().unwrap();
        let b = Requirement::builder("b", RequirementType::integer())
            .id(id)
            .build()
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, text("a").build().unwrap());
    }
}
