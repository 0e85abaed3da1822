//! Dependency and exclusivity relations between requirements.
//!
//! The [`RequirementRelations`] graph knows nothing about the requirements
//! themselves. Nodes are requirement UUIDs, so the graph holds no references
//! into the requirement set and can be validated against any set.

use std::fmt;

use petgraph::{
    graphmap::{DiGraphMap, UnGraphMap},
    Direction,
};
use thiserror::Error;
use uuid::Uuid;

/// The kind of a relation between two requirements `A` and `B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// `A` requires `B` to be bound.
    DependsOn,
    /// `B` requires `A` to be bound. The inverse of [`RelationKind::DependsOn`].
    DependedUpon,
    /// `A` and `B` cannot both be bound.
    ExclusiveWith,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Self::DependsOn => "depends on",
            Self::DependedUpon => "is depended upon by",
            Self::ExclusiveWith => "is exclusive with",
        };
        f.write_str(label)
    }
}

/// Errors that can occur when adding a relation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationError {
    /// A requirement cannot be related to itself.
    #[error("requirement {0} cannot be related to itself")]
    SelfRelation(Uuid),

    /// The pair already carries a relation that contradicts the new one.
    #[error("{requirement} {existing} {other}, so it cannot also be recorded as '{requested}'")]
    Conflict {
        /// The first requirement of the requested relation.
        requirement: Uuid,
        /// The second requirement of the requested relation.
        other: Uuid,
        /// The relation already recorded between the pair.
        existing: RelationKind,
        /// The relation that was requested.
        requested: RelationKind,
    },
}

/// The relation graph over a requirement set.
///
/// Relationships are stored in two graphs:
/// - dependencies: `DiGraphMap<Uuid, ()>`, edges point from a dependent to its
///   dependency, so the inverse `DependedUpon` view is the incoming edge set.
/// - exclusions: `UnGraphMap<Uuid, ()>`, which is symmetric by construction.
#[derive(Debug, Clone, Default)]
pub struct RequirementRelations {
    dependencies: DiGraphMap<Uuid, ()>,
    exclusions: UnGraphMap<Uuid, ()>,
}

impl RequirementRelations {
    /// Create an empty relation graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a relation graph from `(a, b, kind)` triples.
    ///
    /// # Errors
    ///
    /// Fails on the first triple that [`RequirementRelations::add`] rejects.
    pub fn from_triples(
        triples: impl IntoIterator<Item = (Uuid, Uuid, RelationKind)>,
    ) -> Result<Self, RelationError> {
        let mut relations = Self::new();
        for (a, b, kind) in triples {
            relations.add(a, b, kind)?;
        }
        Ok(relations)
    }

    /// Record a relation between `a` and `b`.
    ///
    /// Returns `true` if the relation was new, or `false` if it was already
    /// recorded.
    ///
    /// # Errors
    ///
    /// Returns [`RelationError::SelfRelation`] if `a == b`, or
    /// [`RelationError::Conflict`] if the pair is already related by a
    /// dependency and an exclusivity is requested (or the other way round).
    pub fn add(&mut self, a: Uuid, b: Uuid, kind: RelationKind) -> Result<bool, RelationError> {
        if a == b {
            return Err(RelationError::SelfRelation(a));
        }

        match kind {
            RelationKind::DependsOn => self.add_dependency(a, b, kind),
            RelationKind::DependedUpon => self.add_dependency(b, a, kind),
            RelationKind::ExclusiveWith => {
                if let Some(existing) = self.dependency_between(a, b) {
                    return Err(RelationError::Conflict {
                        requirement: a,
                        other: b,
                        existing,
                        requested: kind,
                    });
                }
                Ok(self.exclusions.add_edge(a, b, ()).is_none())
            }
        }
    }

    /// Record that `dependent` depends on `dependency`.
    ///
    /// # Errors
    ///
    /// See [`RequirementRelations::add`].
    pub fn add_dependency_of(
        &mut self,
        dependent: Uuid,
        dependency: Uuid,
    ) -> Result<bool, RelationError> {
        self.add(dependent, dependency, RelationKind::DependsOn)
    }

    /// Record that `a` and `b` are mutually exclusive.
    ///
    /// # Errors
    ///
    /// See [`RequirementRelations::add`].
    pub fn add_exclusion(&mut self, a: Uuid, b: Uuid) -> Result<bool, RelationError> {
        self.add(a, b, RelationKind::ExclusiveWith)
    }

    fn add_dependency(
        &mut self,
        dependent: Uuid,
        dependency: Uuid,
        requested: RelationKind,
    ) -> Result<bool, RelationError> {
        if self.exclusions.contains_edge(dependent, dependency) {
            let (requirement, other) = match requested {
                RelationKind::DependedUpon => (dependency, dependent),
                _ => (dependent, dependency),
            };
            return Err(RelationError::Conflict {
                requirement,
                other,
                existing: RelationKind::ExclusiveWith,
                requested,
            });
        }

        let previous = self.dependencies.add_edge(dependent, dependency, ());
        Ok(previous.is_none())
    }

    /// The dependency relation between `a` and `b`, seen from `a`.
    fn dependency_between(&self, a: Uuid, b: Uuid) -> Option<RelationKind> {
        if self.dependencies.contains_edge(a, b) {
            Some(RelationKind::DependsOn)
        } else if self.dependencies.contains_edge(b, a) {
            Some(RelationKind::DependedUpon)
        } else {
            None
        }
    }

    /// The relations recorded between `a` and `b`, seen from `a`.
    ///
    /// A pair can depend on each other in both directions (a cycle, rejected
    /// later by the forest), so more than one kind can be returned.
    #[must_use]
    pub fn between(&self, a: Uuid, b: Uuid) -> Vec<RelationKind> {
        let mut kinds = Vec::new();
        if self.dependencies.contains_edge(a, b) {
            kinds.push(RelationKind::DependsOn);
        }
        if self.dependencies.contains_edge(b, a) {
            kinds.push(RelationKind::DependedUpon);
        }
        if self.exclusions.contains_edge(a, b) {
            kinds.push(RelationKind::ExclusiveWith);
        }
        kinds
    }

    /// The requirements `id` depends on, in the order the relations were
    /// added.
    pub fn depends_on(&self, id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.neighbours(id, Direction::Outgoing)
    }

    /// The requirements that depend on `id`.
    pub fn depended_upon_by(&self, id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.neighbours(id, Direction::Incoming)
    }

    fn neighbours(&self, id: Uuid, direction: Direction) -> impl Iterator<Item = Uuid> + '_ {
        self.dependencies
            .contains_node(id)
            .then(|| self.dependencies.neighbors_directed(id, direction))
            .into_iter()
            .flatten()
    }

    /// The requirements `id` is mutually exclusive with.
    pub fn exclusive_with(&self, id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.exclusions
            .contains_node(id)
            .then(|| self.exclusions.neighbors(id))
            .into_iter()
            .flatten()
    }

    /// Every dependency edge as `(dependent, dependency)`.
    pub fn dependency_edges(&self) -> impl Iterator<Item = (Uuid, Uuid)> + '_ {
        self.dependencies.all_edges().map(|(a, b, &())| (a, b))
    }

    /// Every exclusivity edge, each pair reported once.
    pub fn exclusion_edges(&self) -> impl Iterator<Item = (Uuid, Uuid)> + '_ {
        self.exclusions.all_edges().map(|(a, b, &())| (a, b))
    }

    /// Every requirement that takes part in at least one relation.
    pub fn requirements(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.dependencies.nodes().chain(
            self.exclusions
                .nodes()
                .filter(|id| !self.dependencies.contains_node(*id)),
        )
    }

    /// Whether no relation is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependencies.edge_count() == 0 && self.exclusions.edge_count() == 0
    }

    pub(crate) const fn dependency_graph(&self) -> &DiGraphMap<Uuid, ()> {
        &self.dependencies
    }
}
