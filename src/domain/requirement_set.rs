use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    ForestError, RelationError, RelationKind, Requirement, RequirementForest, RequirementRelations,
};

/// Errors raised while assembling a [`RequirementSet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequirementSetError {
    /// Two requirements share an identity.
    #[error("requirement {id} is declared more than once")]
    DuplicateId {
        /// The duplicated identity.
        id: Uuid,
    },

    /// Two requirements share a name.
    #[error("requirement name '{name}' is declared more than once")]
    DuplicateName {
        /// The duplicated name.
        name: String,
    },

    /// A relation could not be recorded.
    #[error(transparent)]
    Relation(#[from] RelationError),

    /// The relations do not form a valid forest.
    #[error(transparent)]
    Forest(#[from] ForestError),
}

/// The closed universe of requirements a configuration is built against.
///
/// Holds the requirements in declaration order together with their relations
/// and the dependency forest derived from them. Everything is validated up
/// front, so a set that exists is structurally sound.
#[derive(Debug, Clone)]
pub struct RequirementSet {
    requirements: Vec<Requirement>,
    by_id: HashMap<Uuid, usize>,
    by_name: HashMap<String, usize>,
    relations: RequirementRelations,
    forest: RequirementForest,
}

impl RequirementSet {
    /// Assemble a set from requirements (in declaration order) and the
    /// relations between them.
    ///
    /// # Errors
    ///
    /// Fails if an identity or name is declared twice, or if the relations are
    /// not a valid forest over these requirements.
    pub fn new(
        requirements: Vec<Requirement>,
        relations: RequirementRelations,
    ) -> Result<Self, RequirementSetError> {
        let mut by_id = HashMap::with_capacity(requirements.len());
        let mut by_name = HashMap::with_capacity(requirements.len());

        for (i, requirement) in requirements.iter().enumerate() {
            if by_id.insert(requirement.id(), i).is_some() {
                return Err(RequirementSetError::DuplicateId {
                    id: requirement.id(),
                });
            }
            if by_name.insert(requirement.name().to_string(), i).is_some() {
                return Err(RequirementSetError::DuplicateName {
                    name: requirement.name().to_string(),
                });
            }
        }

        let forest = RequirementForest::new(&requirements, &relations)?;

        Ok(Self {
            requirements,
            by_id,
            by_name,
            relations,
            forest,
        })
    }

    /// Start assembling a set incrementally.
    #[must_use]
    pub fn builder() -> RequirementSetBuilder {
        RequirementSetBuilder::default()
    }

    /// The requirements, in declaration order.
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Iterate over the requirements, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter()
    }

    /// The number of requirements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Find a requirement by identity.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Requirement> {
        self.index_of(id).map(|i| &self.requirements[i])
    }

    /// Find a requirement by name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Requirement> {
        self.by_name.get(name).map(|&i| &self.requirements[i])
    }

    /// Whether the requirement belongs to this set.
    #[must_use]
    pub fn contains(&self, requirement: &Requirement) -> bool {
        self.by_id.contains_key(&requirement.id())
    }

    /// The relations between the requirements.
    #[must_use]
    pub const fn relations(&self) -> &RequirementRelations {
        &self.relations
    }

    /// The dependency forest.
    #[must_use]
    pub const fn forest(&self) -> &RequirementForest {
        &self.forest
    }

    /// The requirements a requirement depends on.
    pub fn depends_on(&self, requirement: &Requirement) -> impl Iterator<Item = &Requirement> {
        self.resolve(self.relations.depends_on(requirement.id()))
    }

    /// The requirements that depend on a requirement.
    pub fn depended_upon_by(
        &self,
        requirement: &Requirement,
    ) -> impl Iterator<Item = &Requirement> {
        self.resolve(self.relations.depended_upon_by(requirement.id()))
    }

    /// The requirements a requirement is exclusive with.
    pub fn exclusive_with(&self, requirement: &Requirement) -> impl Iterator<Item = &Requirement> {
        self.resolve(self.relations.exclusive_with(requirement.id()))
    }

    pub(crate) fn index_of(&self, id: Uuid) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    pub(crate) fn index_of_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    fn resolve<'a>(
        &'a self,
        ids: impl Iterator<Item = Uuid> + 'a,
    ) -> impl Iterator<Item = &'a Requirement> + 'a {
        ids.filter_map(move |id| self.get(id))
    }
}

/// Incremental assembly of a [`RequirementSet`].
#[derive(Debug, Default)]
#[must_use]
pub struct RequirementSetBuilder {
    requirements: Vec<Requirement>,
    relations: RequirementRelations,
}

impl RequirementSetBuilder {
    /// Declare a requirement.
    pub fn requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Declare several requirements, in order.
    pub fn requirements(mut self, requirements: impl IntoIterator<Item = Requirement>) -> Self {
        self.requirements.extend(requirements);
        self
    }

    /// Relate two requirements.
    ///
    /// # Errors
    ///
    /// See [`RequirementRelations::add`].
    pub fn relate(
        mut self,
        a: &Requirement,
        b: &Requirement,
        kind: RelationKind,
    ) -> Result<Self, RequirementSetError> {
        self.relations.add(a.id(), b.id(), kind)?;
        Ok(self)
    }

    /// Record that `dependent` depends on `dependency`.
    ///
    /// # Errors
    ///
    /// See [`RequirementRelations::add`].
    pub fn depends_on(
        self,
        dependent: &Requirement,
        dependency: &Requirement,
    ) -> Result<Self, RequirementSetError> {
        self.relate(dependent, dependency, RelationKind::DependsOn)
    }

    /// Record that `a` and `b` are mutually exclusive.
    ///
    /// # Errors
    ///
    /// See [`RequirementRelations::add`].
    pub fn exclusive_with(
        self,
        a: &Requirement,
        b: &Requirement,
    ) -> Result<Self, RequirementSetError> {
        self.relate(a, b, RelationKind::ExclusiveWith)
    }

    /// Validate and assemble the set.
    ///
    /// # Errors
    ///
    /// See [`RequirementSet::new`].
    pub fn build(self) -> Result<RequirementSet, RequirementSetError> {
        RequirementSet::new(self.requirements, self.relations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RequirementType;

    fn text(name: &str) -> Requirement {
        Requirement::builder(name, RequirementType::text())
            .build()
            .unwrap()
    }

    #[test]
    fn lookups_resolve_by_id_and_name() {
        let host = text("host");
        let port = text("port");
        let set = RequirementSet::builder()
            .requirement(host.clone())
            .requirement(port.clone())
            .depends_on(&host, &port)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get(port.id()), Some(&port));
        assert_eq!(set.find_by_name("host"), Some(&host));
        assert_eq!(set.depends_on(&host).collect::<Vec<_>>(), vec![&port]);
        assert_eq!(set.depended_upon_by(&port).collect::<Vec<_>>(), vec![&host]);
        assert!(set.contains(&host));
        assert!(!set.contains(&text("other")));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let requirements = vec![text("host"), text("host")];
        let result = RequirementSet::new(requirements, RequirementRelations::new());
        assert_eq!(
            result.unwrap_err(),
            RequirementSetError::DuplicateName {
                name: "host".to_string()
            }
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let host = text("host");
        let requirements = vec![host.clone(), host.clone()];
        let result = RequirementSet::new(requirements, RequirementRelations::new());
        assert_eq!(
            result.unwrap_err(),
            RequirementSetError::DuplicateId { id: host.id() }
        );
    }

    #[test]
    fn cycles_surface_as_forest_errors() {
        let a = text("a");
        let b = text("b");
        let result = RequirementSet::builder()
            .requirement(a.clone())
            .requirement(b.clone())
            .depends_on(&a, &b)
            .unwrap()
            .depends_on(&b, &a)
            .unwrap()
            .build();

        assert!(matches!(
            result,
            Err(RequirementSetError::Forest(ForestError::Cycle { .. }))
        ));
    }

    #[test]
    fn direct_contradiction_is_rejected_when_relating() {
        let a = text("a");
        let b = text("b");
        let result = RequirementSet::builder()
            .requirement(a.clone())
            .requirement(b.clone())
            .exclusive_with(&a, &b)
            .unwrap()
            .depends_on(&b, &a);

        assert!(matches!(
            result,
            Err(RequirementSetError::Relation(RelationError::Conflict { .. }))
        ));
    }
}
