//! The validated outcome of binding values to a requirement set.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    ops::Index,
    sync::Arc,
};

use uuid::Uuid;

use crate::domain::{
    ConfigurationBuilder, FromValue, Requirement, RequirementSet, ValidationErrors, Value,
    Violation,
};

/// Identifies the requirement a value is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingKey {
    /// By stable identity.
    Id(Uuid),
    /// By name.
    Name(String),
}

impl BindingKey {
    /// Find the requirement this key refers to.
    #[must_use]
    pub fn resolve<'a>(&self, source: &'a RequirementSet) -> Option<&'a Requirement> {
        match self {
            Self::Id(id) => source.get(*id),
            Self::Name(name) => source.find_by_name(name),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<Uuid> for BindingKey {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

impl From<&Requirement> for BindingKey {
    fn from(requirement: &Requirement) -> Self {
        Self::Id(requirement.id())
    }
}

impl From<&str> for BindingKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for BindingKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// The outcome of looking a requirement up in a [`Configuration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// The requirement is bound to this value.
    Bound(&'a Value),
    /// The requirement belongs to the requirement set but has no value.
    Unbound,
    /// The requirement is not part of the requirement set.
    Unknown,
}

impl<'a> Lookup<'a> {
    /// The bound value, if any.
    #[must_use]
    pub const fn value(self) -> Option<&'a Value> {
        match self {
            Self::Bound(value) => Some(value),
            Self::Unbound | Self::Unknown => None,
        }
    }
}

/// An immutable, validated mapping from requirements to values.
///
/// Only a [`ConfigurationBuilder`] can create one. It keeps a shared reference
/// to the requirement set it was validated against.
#[derive(Debug, Clone)]
pub struct Configuration {
    source: Arc<RequirementSet>,
    /// Keyed by declaration index, so iteration follows declaration order.
    values: BTreeMap<usize, Value>,
}

impl Configuration {
    pub(crate) const fn new(source: Arc<RequirementSet>, values: BTreeMap<usize, Value>) -> Self {
        Self { source, values }
    }

    /// Bind every value and build, in one call.
    ///
    /// Rejections from individual bindings and violations found while building
    /// are reported together. A requirement whose value was rejected is not
    /// also reported as missing.
    ///
    /// # Errors
    ///
    /// Returns every violation found.
    pub fn from_bindings<K, V>(
        source: Arc<RequirementSet>,
        bindings: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, ValidationErrors>
    where
        K: Into<BindingKey>,
        V: Into<Value>,
    {
        let builder = ConfigurationBuilder::new(source);
        let mut violations = Vec::new();
        let mut rejected = HashSet::new();

        for (key, value) in bindings {
            let key = key.into();
            if let Err(errors) = builder.add(key.clone(), value) {
                if let Some(requirement) = key.resolve(builder.source()) {
                    rejected.insert(requirement.id());
                }
                violations.extend(errors.into_vec());
            }
        }

        let errors = match builder.build() {
            Ok(configuration) => {
                return ValidationErrors::from_vec(violations).map_or(Ok(configuration), Err);
            }
            Err(errors) => errors,
        };

        violations.extend(
            errors
                .iter()
                .filter(|violation| {
                    !matches!(
                        violation,
                        Violation::MissingRequiredRequirement { requirement }
                            if rejected.contains(&requirement.id)
                    )
                })
                .cloned(),
        );
        Err(ValidationErrors::from_vec(violations).unwrap_or(errors))
    }

    /// The requirement set this configuration was validated against.
    #[must_use]
    pub fn source(&self) -> &RequirementSet {
        &self.source
    }

    /// A shared handle to the requirement set.
    #[must_use]
    pub fn source_handle(&self) -> Arc<RequirementSet> {
        Arc::clone(&self.source)
    }

    /// Look up a requirement, distinguishing unbound from unknown.
    pub fn lookup(&self, key: impl Into<BindingKey>) -> Lookup<'_> {
        let key = key.into();
        let index = match &key {
            BindingKey::Id(id) => self.source.index_of(*id),
            BindingKey::Name(name) => self.source.index_of_name(name),
        };

        index.map_or(Lookup::Unknown, |index| {
            self.values
                .get(&index)
                .map_or(Lookup::Unbound, Lookup::Bound)
        })
    }

    /// The value bound to a requirement.
    pub fn get(&self, key: impl Into<BindingKey>) -> Option<&Value> {
        self.lookup(key).value()
    }

    /// The value bound to a requirement, or `default` if there is none.
    pub fn get_or<'a>(&'a self, key: impl Into<BindingKey>, default: &'a Value) -> &'a Value {
        self.get(key).unwrap_or(default)
    }

    /// The strongly-typed value bound to a requirement.
    ///
    /// Returns `None` rather than failing when the requirement is unbound,
    /// unknown, or bound to a value of another type.
    pub fn get_as<T: FromValue>(&self, key: impl Into<BindingKey>) -> Option<T> {
        self.get(key).and_then(T::from_value)
    }

    /// Whether a value is bound to the requirement.
    pub fn contains(&self, key: impl Into<BindingKey>) -> bool {
        matches!(self.lookup(key), Lookup::Bound(_))
    }

    /// Iterate over the bindings, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Requirement, &Value)> + '_ {
        let requirements = self.source.requirements();
        self.values
            .iter()
            .map(move |(&index, value)| (&requirements[index], value))
    }

    /// The number of bound requirements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no requirement is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((a, x), (b, y))| a.id() == b.id() && x == y)
    }
}

impl Eq for Configuration {}

impl Index<&str> for Configuration {
    type Output = Value;

    /// # Panics
    ///
    /// Panics if no value is bound to a requirement of that name.
    fn index(&self, name: &str) -> &Value {
        self.get(name)
            .unwrap_or_else(|| panic!("requirement '{name}' is not bound in this configuration"))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::{RequirementType, ViolationKind};

    fn set(requirements: Vec<Requirement>) -> Arc<RequirementSet> {
        let set = RequirementSet::builder()
            .requirements(requirements)
            .build()
            .unwrap();
        Arc::new(set)
    }

    fn configure<K, V>(
        requirements: Vec<Requirement>,
        bindings: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Configuration, ValidationErrors>
    where
        K: Into<BindingKey>,
        V: Into<Value>,
    {
        Configuration::from_bindings(set(requirements), bindings)
    }

    #[test]
    fn string_requirement_round_trip() {
        let r = Requirement::builder("R", RequirementType::text())
            .build()
            .unwrap();
        let configuration = configure(vec![r.clone()], [(&r, "hello")]).unwrap();

        assert_eq!(configuration["R"], "hello");
        assert_eq!(configuration.get_as::<String>(&r).as_deref(), Some("hello"));
    }

    #[test]
    fn lookup_distinguishes_unbound_from_unknown() {
        let host = Requirement::builder("host", RequirementType::text())
            .build()
            .unwrap();
        let port = Requirement::builder("port", RequirementType::integer())
            .optional()
            .build()
            .unwrap();
        let requirements = vec![host.clone(), port.clone()];
        let configuration = configure(requirements, [("host", "localhost")]).unwrap();

        let localhost = Value::from("localhost");
        assert_eq!(configuration.lookup(&host), Lookup::Bound(&localhost));
        assert_eq!(configuration.lookup(&port), Lookup::Unbound);
        assert_eq!(configuration.lookup("nope"), Lookup::Unknown);
        assert_eq!(configuration.lookup(Uuid::new_v4()), Lookup::Unknown);

        let fallback = Value::from(8080);
        assert_eq!(configuration.get_or(&port, &fallback), &fallback);
        assert!(configuration.contains("host"));
        assert!(!configuration.contains("port"));
    }

    #[test]
    fn typed_access_reports_mismatch_without_failing() {
        let target = Requirement::builder("target", RequirementType::path())
            .build()
            .unwrap();
        let out = PathBuf::from("/tmp/out");
        let bindings = [(&target, out.clone())];
        let configuration = configure(vec![target.clone()], bindings).unwrap();

        assert_eq!(configuration.get_as::<PathBuf>(&target), Some(out));
        assert_eq!(configuration.get_as::<i64>(&target), None);
    }

    #[test]
    fn rejected_binding_is_not_also_reported_missing() {
        let port = Requirement::builder("port", RequirementType::integer())
            .build()
            .unwrap();
        let errors = configure(vec![port], [("port", "eighty")]).unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().kind(), ViolationKind::TypeMismatch);
    }

    #[test]
    fn unknown_bindings_are_reported_with_build_errors() {
        let host = Requirement::builder("host", RequirementType::text())
            .build()
            .unwrap();
        let errors = configure(vec![host], [("hots", "localhost")]).unwrap_err();

        let violations = errors.into_vec();
        assert_eq!(violations.len(), 2);
        assert!(matches!(&violations[0], Violation::UnknownRequirement { key } if key == "hots"));
        assert!(matches!(&violations[1], Violation::MissingRequiredRequirement { .. }));
    }

    #[test]
    fn iteration_and_equality_follow_the_mapping() {
        let a = Requirement::builder("a", RequirementType::integer())
            .build()
            .unwrap();
        let b = Requirement::builder("b", RequirementType::integer())
            .build()
            .unwrap();
        let source = set(vec![a.clone(), b.clone()]);

        let first = Configuration::from_bindings(Arc::clone(&source), [(&b, 2), (&a, 1)]);
        let second = Configuration::from_bindings(Arc::clone(&source), [(&a, 1), (&b, 2)]);
        let third = Configuration::from_bindings(source, [(&a, 1), (&b, 3)]);
        let (first, second, third) = (first.unwrap(), second.unwrap(), third.unwrap());

        let names: Vec<_> = first.iter().map(|(r, _)| r.name()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(first, second);
        assert_ne!(first, third);
    }
}
