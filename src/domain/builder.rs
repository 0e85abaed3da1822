use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, instrument, trace};

use crate::domain::{
    violation::Collector, BindingKey, Configuration, DependencyView, RequirementRef, RequirementSet,
    ValidationErrors, Value, Violation,
};

/// Accumulates bindings against a [`RequirementSet`] and validates them into a
/// [`Configuration`].
///
/// [`ConfigurationBuilder::add`] takes `&self`, so any number of producers can
/// bind values concurrently. Building consumes the builder: once every
/// producer is done, the bindings are validated together.
///
/// Each binding is checked on its own as soon as it is added. Checks that
/// need more than one binding (required requirements, exclusivity,
/// dependencies, custom validators) run at build time.
#[derive(Debug)]
pub struct ConfigurationBuilder {
    source: Arc<RequirementSet>,
    /// Keyed by declaration index.
    pending: Mutex<BTreeMap<usize, Value>>,
}

impl ConfigurationBuilder {
    /// Start binding values against `source`.
    #[must_use]
    pub fn new(source: Arc<RequirementSet>) -> Self {
        Self {
            source,
            pending: Mutex::default(),
        }
    }

    /// The requirement set values are bound against.
    #[must_use]
    pub fn source(&self) -> &RequirementSet {
        &self.source
    }

    /// Bind a value to a requirement.
    ///
    /// A rejected binding is not stored, so it can be retried.
    ///
    /// # Errors
    ///
    /// Fails if the requirement is not in the set, is already bound, or if the
    /// value breaks the requirement's type, cardinality or allowed-value
    /// rules.
    pub fn add(
        &self,
        key: impl Into<BindingKey>,
        value: impl Into<Value>,
    ) -> Result<(), ValidationErrors> {
        let key = key.into();
        let value = value.into();

        let index = match &key {
            BindingKey::Id(id) => self.source.index_of(*id),
            BindingKey::Name(name) => self.source.index_of_name(name),
        }
        .ok_or_else(|| {
            ValidationErrors::single(Violation::UnknownRequirement {
                key: key.to_string(),
            })
        })?;
        let requirement = &self.source.requirements()[index];

        let mut pending = self.pending();
        if pending.contains_key(&index) {
            return Err(ValidationErrors::single(Violation::DuplicateRequirement {
                requirement: requirement.into(),
            }));
        }
        requirement.check_value(&value)?;

        trace!(requirement = requirement.name(), %value, "bound");
        pending.insert(index, value);
        drop(pending);
        Ok(())
    }

    /// The number of values bound so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending().len()
    }

    /// Whether no value has been bound yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }

    /// Validate the bindings together and produce the configuration.
    ///
    /// # Errors
    ///
    /// Returns every violation found, in a stable order: missing required
    /// requirements in declaration order, then value and custom-validator
    /// violations in dependency order, then exclusivity conflicts, then unmet
    /// dependencies.
    #[instrument(level = "debug", skip(self), fields(bindings))]
    pub fn build(self) -> Result<Configuration, ValidationErrors> {
        let bindings = self
            .pending
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        tracing::Span::current().record("bindings", bindings.len());

        if let Err(errors) = validate(&self.source, &bindings) {
            debug!(violations = errors.len(), "configuration rejected");
            return Err(errors);
        }

        debug!("configuration built");
        Ok(Configuration::new(self.source, bindings))
    }

    fn pending(&self) -> MutexGuard<'_, BTreeMap<usize, Value>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate(
    source: &RequirementSet,
    bindings: &BTreeMap<usize, Value>,
) -> Result<(), ValidationErrors> {
    let requirements = source.requirements();
    let forest = source.forest();
    let mut collector = Collector::default();

    for (index, requirement) in requirements.iter().enumerate() {
        if !requirement.is_optional() && !bindings.contains_key(&index) {
            collector.push(Violation::MissingRequiredRequirement {
                requirement: requirement.into(),
            });
        }
    }

    // Dependencies come first in topological order, so a custom validator
    // only ever sees dependency values that have already passed.
    let mut valid = vec![false; requirements.len()];
    for node in forest.topological() {
        let Some(value) = bindings.get(&node.index()) else {
            continue;
        };
        let view = DependencyView::new(
            node.dependencies()
                .iter()
                .filter(|&&dependency| valid[dependency])
                .filter_map(|&dependency| {
                    bindings
                        .get(&dependency)
                        .map(|value| (&requirements[dependency], value))
                })
                .collect(),
        );

        match requirements[node.index()].validate(value, &view) {
            Ok(()) => valid[node.index()] = true,
            Err(errors) => collector.absorb(errors),
        }
    }

    let mut conflicts: Vec<(usize, usize)> = source
        .relations()
        .exclusion_edges()
        .filter_map(|(a, b)| Some((source.index_of(a)?, source.index_of(b)?)))
        .map(|(a, b)| (a.min(b), a.max(b)))
        .filter(|(a, b)| bindings.contains_key(a) && bindings.contains_key(b))
        .collect();
    conflicts.sort_unstable();
    for (a, b) in conflicts {
        collector.push(Violation::ConflictingExclusiveRequirements {
            requirement: (&requirements[a]).into(),
            other: (&requirements[b]).into(),
        });
    }

    for &index in bindings.keys() {
        let Some(node) = forest.node_at(index) else {
            continue;
        };
        let missing: Vec<RequirementRef> = node
            .dependencies()
            .iter()
            .filter(|dependency| !bindings.contains_key(dependency))
            .map(|&dependency| (&requirements[dependency]).into())
            .collect();
        if !missing.is_empty() {
            collector.push(Violation::DependenciesNotSatisfied {
                requirement: (&requirements[index]).into(),
                missing,
            });
        }
    }

    collector.finish()
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::domain::{
        CollectionInfo, Requirement, RequirementType, SetRestrictionInfo, ViolationKind,
    };

    fn requirement(name: &str, requirement_type: RequirementType) -> Requirement {
        Requirement::builder(name, requirement_type).build().unwrap()
    }

    fn optional(name: &str, requirement_type: RequirementType) -> Requirement {
        Requirement::builder(name, requirement_type)
            .optional()
            .build()
            .unwrap()
    }

    #[test]
    fn builds_when_everything_is_satisfied() {
        let r = requirement("R", RequirementType::text());
        let set = RequirementSet::builder()
            .requirement(r.clone())
            .build()
            .unwrap();
        let builder = ConfigurationBuilder::new(Arc::new(set));

        builder.add(&r, "hello").unwrap();
        let configuration = builder.build().unwrap();

        assert_eq!(configuration.get(&r), Some(&Value::from("hello")));
        assert_eq!(configuration.len(), 1);
    }

    #[test]
    fn exclusive_requirements_cannot_both_be_bound() {
        let a = optional("A", RequirementType::boolean());
        let b = optional("B", RequirementType::boolean());
        let set = Arc::new(
            RequirementSet::builder()
                .requirement(a.clone())
                .requirement(b.clone())
                .exclusive_with(&a, &b)
                .unwrap()
                .build()
                .unwrap(),
        );

        let builder = ConfigurationBuilder::new(Arc::clone(&set));
        builder.add(&a, true).unwrap();
        builder.add(&b, true).unwrap();
        let violations = builder.build().unwrap_err().into_vec();
        assert_eq!(
            violations,
            vec![Violation::ConflictingExclusiveRequirements {
                requirement: (&a).into(),
                other: (&b).into(),
            }]
        );

        let builder = ConfigurationBuilder::new(set);
        builder.add(&a, true).unwrap();
        let configuration = builder.build().unwrap();
        assert_eq!(configuration.get_as::<bool>(&a), Some(true));
        assert!(!configuration.contains(&b));
    }

    #[test]
    fn dependencies_must_be_bound() {
        let a = optional("A", RequirementType::integer());
        let b = optional("B", RequirementType::integer());
        let set = Arc::new(
            RequirementSet::builder()
                .requirement(a.clone())
                .requirement(b.clone())
                .depends_on(&a, &b)
                .unwrap()
                .build()
                .unwrap(),
        );

        let builder = ConfigurationBuilder::new(Arc::clone(&set));
        builder.add(&a, 1).unwrap();
        let violations = builder.build().unwrap_err().into_vec();
        assert_eq!(
            violations,
            vec![Violation::DependenciesNotSatisfied {
                requirement: (&a).into(),
                missing: vec![(&b).into()],
            }]
        );

        let builder = ConfigurationBuilder::new(set);
        builder.add(&a, 1).unwrap();
        builder.add(&b, 2).unwrap();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn every_missing_requirement_is_reported() {
        let x = requirement("X", RequirementType::text());
        let y = requirement("Y", RequirementType::text());
        let set = RequirementSet::builder()
            .requirement(x)
            .requirement(y)
            .build()
            .unwrap();

        let errors = ConfigurationBuilder::new(Arc::new(set))
            .build()
            .unwrap_err();
        let names: Vec<_> = errors
            .iter()
            .inspect(|violation| assert_eq!(violation.kind(), ViolationKind::Structural))
            .filter_map(|violation| violation.requirement().map(|r| r.name.clone()))
            .collect();
        assert_eq!(names, ["X", "Y"]);
    }

    #[test]
    fn optional_requirements_may_be_left_unbound() {
        let set = RequirementSet::builder()
            .requirement(optional("verbose", RequirementType::boolean()))
            .build()
            .unwrap();
        let configuration = ConfigurationBuilder::new(Arc::new(set)).build().unwrap();
        assert!(configuration.is_empty());
    }

    #[test]
    fn empty_requirement_set_builds_empty_configuration() {
        let set = RequirementSet::builder().build().unwrap();
        let configuration = ConfigurationBuilder::new(Arc::new(set)).build().unwrap();
        assert!(configuration.is_empty());
    }

    #[test]
    fn invalid_values_are_rejected_on_add() {
        let level = Requirement::builder("level", RequirementType::text())
            .allow(SetRestrictionInfo::allow("debug"))
            .allow(SetRestrictionInfo::allow("info"))
            .build()
            .unwrap();
        let set = RequirementSet::builder()
            .requirement(level.clone())
            .build()
            .unwrap();
        let builder = ConfigurationBuilder::new(Arc::new(set));

        let errors = builder.add(&level, "loud").unwrap_err();
        assert_eq!(errors.first().kind(), ViolationKind::SetMembership);
        assert!(builder.is_empty());

        let errors = builder.add(&level, 3).unwrap_err();
        assert_eq!(errors.first().kind(), ViolationKind::TypeMismatch);

        builder.add(&level, "info").unwrap();
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn unknown_and_duplicate_bindings_are_rejected() {
        let name = requirement("name", RequirementType::text());
        let set = RequirementSet::builder()
            .requirement(name.clone())
            .build()
            .unwrap();
        let builder = ConfigurationBuilder::new(Arc::new(set));

        let stranger = requirement("name", RequirementType::text());
        let errors = builder.add(&stranger, "x").unwrap_err();
        assert!(matches!(errors.first(), Violation::UnknownRequirement { .. }));

        builder.add("name", "first").unwrap();
        let errors = builder.add(&name, "second").unwrap_err();
        assert_eq!(
            errors.first(),
            &Violation::DuplicateRequirement {
                requirement: (&name).into()
            }
        );

        let configuration = builder.build().unwrap();
        assert_eq!(configuration["name"], "first");
    }

    #[test]
    fn custom_validators_see_validated_dependencies() {
        let min = requirement("min", RequirementType::integer());
        let max = Requirement::builder("max", RequirementType::integer())
            .validator(|value, dependencies| {
                let max = value.to::<i64>().unwrap_or_default();
                match dependencies.get_as::<i64>("min") {
                    Some(min) if min > max => Err(format!("{max} is below the minimum {min}")),
                    _ => Ok(()),
                }
            })
            .build()
            .unwrap();
        let set = Arc::new(
            RequirementSet::builder()
                .requirement(max.clone())
                .requirement(min.clone())
                .depends_on(&max, &min)
                .unwrap()
                .build()
                .unwrap(),
        );

        let builder = ConfigurationBuilder::new(Arc::clone(&set));
        builder.add(&min, 10).unwrap();
        builder.add(&max, 5).unwrap();
        let errors = builder.build().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().kind(), ViolationKind::Custom);

        let builder = ConfigurationBuilder::new(set);
        builder.add(&min, 1).unwrap();
        builder.add(&max, 5).unwrap();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn violations_are_ordered_by_check() {
        let mode = optional("mode", RequirementType::text());
        let fast = optional("fast", RequirementType::boolean());
        let safe = optional("safe", RequirementType::boolean());
        let name = requirement("name", RequirementType::text());
        let set = RequirementSet::builder()
            .requirement(mode.clone())
            .requirement(fast.clone())
            .requirement(safe.clone())
            .requirement(name)
            .exclusive_with(&fast, &safe)
            .unwrap()
            .depends_on(&fast, &mode)
            .unwrap()
            .build()
            .unwrap();
        let builder = ConfigurationBuilder::new(Arc::new(set));
        builder.add(&fast, true).unwrap();
        builder.add(&safe, true).unwrap();

        let kinds: Vec<_> = builder
            .build()
            .unwrap_err()
            .iter()
            .map(|violation| match violation {
                Violation::MissingRequiredRequirement { .. } => "missing",
                Violation::ConflictingExclusiveRequirements { .. } => "conflict",
                Violation::DependenciesNotSatisfied { .. } => "dependencies",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, ["missing", "conflict", "dependencies"]);
    }

    #[test]
    fn collection_bounds_are_enforced() {
        let hosts = Requirement::builder("hosts", RequirementType::text_list())
            .collection(CollectionInfo::between(1, 2).unwrap())
            .build()
            .unwrap();
        let set = RequirementSet::builder()
            .requirement(hosts.clone())
            .build()
            .unwrap();
        let builder = ConfigurationBuilder::new(Arc::new(set));

        let errors = builder.add(&hosts, vec!["a", "b", "c"]).unwrap_err();
        assert_eq!(errors.first().kind(), ViolationKind::Cardinality);
        builder.add(&hosts, vec!["a", "b"]).unwrap();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn concurrent_adds_are_all_visible_to_build() {
        let requirements: Vec<_> = (0..16)
            .map(|i| requirement(&format!("r{i}"), RequirementType::integer()))
            .collect();
        let set = RequirementSet::builder()
            .requirements(requirements.clone())
            .build()
            .unwrap();
        let builder = ConfigurationBuilder::new(Arc::new(set));

        thread::scope(|scope| {
            for (i, requirement) in requirements.iter().enumerate() {
                let builder = &builder;
                let value = i64::try_from(i).unwrap();
                scope.spawn(move || builder.add(requirement, value).unwrap());
            }
        });

        let configuration = builder.build().unwrap();
        assert_eq!(configuration.len(), 16);
        assert_eq!(configuration.get_as::<i64>("r7"), Some(7));
    }

    #[test]
    fn concurrent_duplicates_admit_exactly_one() {
        let r = requirement("r", RequirementType::integer());
        let set = RequirementSet::builder()
            .requirement(r.clone())
            .build()
            .unwrap();
        let builder = ConfigurationBuilder::new(Arc::new(set));

        let accepted: usize = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let builder = &builder;
                    let r = &r;
                    scope.spawn(move || builder.add(r, i).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| usize::from(handle.join().unwrap()))
                .sum()
        });

        assert_eq!(accepted, 1);
        assert!(builder.build().is_ok());
    }
}
