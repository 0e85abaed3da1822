//! Partition of a requirement set into dependency trees.
//!
//! Nodes live in an arena indexed by declaration order, and the edges between
//! them are index lists. The forest is rebuilt from scratch whenever the
//! relations change, so there are no back-pointers to keep consistent.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap, VecDeque},
};

use petgraph::{
    algo::{has_path_connecting, tarjan_scc},
    unionfind::UnionFind,
};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{Requirement, RequirementRef, RequirementRelations};

/// Errors that can occur when building a [`RequirementForest`].
///
/// These indicate a mistake in the requirement declarations, not bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForestError {
    /// A relation names a requirement that is not in the set.
    #[error("a relation refers to requirement {0}, which is not in the requirement set")]
    UnknownRequirement(Uuid),

    /// The dependency relation contains a cycle.
    #[error("dependency cycle between {}", join(.members))]
    Cycle {
        /// The requirements on the cycle, in declaration order.
        members: Vec<RequirementRef>,
    },

    /// Two requirements are exclusive with each other, but one of them
    /// (transitively) depends on the other.
    #[error("{requirement} and {other} are exclusive, but one depends on the other")]
    Contradiction {
        /// The first requirement, in declaration order.
        requirement: RequirementRef,
        /// The second requirement.
        other: RequirementRef,
    },
}

fn join(members: &[RequirementRef]) -> String {
    members
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A requirement's position in the forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    requirement: Uuid,
    index: usize,
    dependencies: Vec<usize>,
    dependents: Vec<usize>,
}

impl TreeNode {
    /// The requirement at this node.
    #[must_use]
    pub const fn requirement(&self) -> Uuid {
        self.requirement
    }

    /// The declaration index of the requirement.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Declaration indices of the requirements this one depends on.
    #[must_use]
    pub fn dependencies(&self) -> &[usize] {
        &self.dependencies
    }

    /// Declaration indices of the requirements that depend on this one.
    #[must_use]
    pub fn dependents(&self) -> &[usize] {
        &self.dependents
    }

    /// Whether this node has no dependency.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.dependencies.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Span {
    /// Member indices, ascending.
    members: Vec<usize>,
    /// Members without a dependency, ascending.
    roots: Vec<usize>,
}

/// The dependency forest of a requirement set.
///
/// Every requirement belongs to exactly one tree. A tree is a weakly connected
/// component of the dependency relation, so a requirement with several
/// dependencies joins their trees together; a requirement without any
/// relation forms a tree of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementForest {
    nodes: Vec<TreeNode>,
    index: HashMap<Uuid, usize>,
    trees: Vec<Span>,
    /// Which tree each node belongs to.
    membership: Vec<usize>,
    /// Topological order over the whole forest.
    order: Vec<usize>,
}

impl RequirementForest {
    /// Build the forest for a requirement set.
    ///
    /// `requirements` must be in declaration order and free of duplicates.
    ///
    /// # Errors
    ///
    /// Fails if a relation refers to a requirement outside of `requirements`,
    /// if the dependencies contain a cycle, or if two exclusive requirements
    /// are connected by a dependency path.
    #[instrument(level = "debug", skip_all, fields(requirements = requirements.len()))]
    pub fn new(
        requirements: &[Requirement],
        relations: &RequirementRelations,
    ) -> Result<Self, ForestError> {
        let index: HashMap<Uuid, usize> = requirements
            .iter()
            .enumerate()
            .map(|(i, requirement)| (requirement.id(), i))
            .collect();

        let lookup = |id: Uuid| {
            index
                .get(&id)
                .copied()
                .ok_or(ForestError::UnknownRequirement(id))
        };

        let mut nodes: Vec<TreeNode> = requirements
            .iter()
            .enumerate()
            .map(|(i, requirement)| TreeNode {
                requirement: requirement.id(),
                index: i,
                dependencies: Vec::new(),
                dependents: Vec::new(),
            })
            .collect();

        for (dependent, dependency) in relations.dependency_edges() {
            let dependent = lookup(dependent)?;
            let dependency = lookup(dependency)?;
            nodes[dependent].dependencies.push(dependency);
            nodes[dependency].dependents.push(dependent);
        }

        let mut exclusions = Vec::new();
        for (a, b) in relations.exclusion_edges() {
            let (a, b) = (lookup(a)?, lookup(b)?);
            exclusions.push((a.min(b), a.max(b)));
        }
        exclusions.sort_unstable();

        for node in &mut nodes {
            node.dependencies.sort_unstable();
            node.dependents.sort_unstable();
        }

        let order = topological_order(&nodes);
        if order.len() < nodes.len() {
            return Err(cycle_error(requirements, relations, &index));
        }

        for (a, b) in exclusions {
            let (id_a, id_b) = (nodes[a].requirement, nodes[b].requirement);
            let graph = relations.dependency_graph();
            #[allow(clippy::suspicious_operation_groupings)]
            let connected = graph.contains_node(id_a)
                && graph.contains_node(id_b)
                && (has_path_connecting(graph, id_a, id_b, None)
                    || has_path_connecting(graph, id_b, id_a, None));
            if connected {
                return Err(ForestError::Contradiction {
                    requirement: (&requirements[a]).into(),
                    other: (&requirements[b]).into(),
                });
            }
        }

        let (trees, membership) = partition(&nodes);
        debug!(trees = trees.len(), "built requirement forest");

        Ok(Self {
            nodes,
            index,
            trees,
            membership,
            order,
        })
    }

    /// The number of requirements in the forest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the forest is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node of a requirement.
    #[must_use]
    pub fn node(&self, id: Uuid) -> Option<&TreeNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// The node at a declaration index.
    #[must_use]
    pub fn node_at(&self, index: usize) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    /// Iterate over the trees, ordered by their first declared member.
    pub fn trees(&self) -> impl Iterator<Item = RequirementTree<'_>> + '_ {
        self.trees
            .iter()
            .map(move |span| RequirementTree { forest: self, span })
    }

    /// The tree a requirement belongs to.
    #[must_use]
    pub fn tree_of(&self, id: Uuid) -> Option<RequirementTree<'_>> {
        let node = *self.index.get(&id)?;
        let span = &self.trees[self.membership[node]];
        Some(RequirementTree { forest: self, span })
    }

    /// Every node in dependency order: each node comes after all of its
    /// dependencies, and ties are broken by declaration order.
    pub fn topological(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.order.iter().map(|&i| &self.nodes[i])
    }
}

/// One dependency tree of a [`RequirementForest`].
#[derive(Debug, Clone, Copy)]
pub struct RequirementTree<'a> {
    forest: &'a RequirementForest,
    span: &'a Span,
}

impl<'a> RequirementTree<'a> {
    /// The requirements of this tree that have no dependency.
    pub fn roots(&self) -> impl Iterator<Item = &'a TreeNode> + 'a {
        let forest = self.forest;
        self.span.roots.iter().map(move |&i| &forest.nodes[i])
    }

    /// Every node of the tree, in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &'a TreeNode> + 'a {
        let forest = self.forest;
        self.span.members.iter().map(move |&i| &forest.nodes[i])
    }

    /// The number of requirements in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.span.members.len()
    }

    /// Always `false`: a tree holds at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.span.members.is_empty()
    }

    /// Whether the requirement belongs to this tree.
    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.forest
            .index
            .get(&id)
            .is_some_and(|i| self.span.members.binary_search(i).is_ok())
    }

    /// Breadth-first traversal from the roots, following the edges from a
    /// dependency to its dependents.
    ///
    /// Roots and dependents are visited in declaration order; each node is
    /// visited once.
    #[must_use]
    pub fn breadth_first(&self) -> Vec<&'a TreeNode> {
        let nodes = &self.forest.nodes;
        let mut visited = vec![false; nodes.len()];
        let mut queue: VecDeque<usize> = self.span.roots.iter().copied().collect();
        for &root in &self.span.roots {
            visited[root] = true;
        }

        let mut traversal = Vec::with_capacity(self.len());
        while let Some(current) = queue.pop_front() {
            traversal.push(&nodes[current]);
            for &dependent in &nodes[current].dependents {
                if !visited[dependent] {
                    visited[dependent] = true;
                    queue.push_back(dependent);
                }
            }
        }
        traversal
    }

    /// The tree's nodes in dependency order, ties broken by declaration order.
    #[must_use]
    pub fn topological(&self) -> Vec<&'a TreeNode> {
        let forest = self.forest;
        let tree = forest.membership[self.span.members[0]];
        forest
            .order
            .iter()
            .filter(|&&i| forest.membership[i] == tree)
            .map(|&i| &forest.nodes[i])
            .collect()
    }
}

/// Kahn's algorithm, always picking the ready node declared first.
///
/// Returns fewer nodes than it was given when the dependencies are cyclic.
fn topological_order(nodes: &[TreeNode]) -> Vec<usize> {
    let mut pending: Vec<usize> = nodes.iter().map(|node| node.dependencies.len()).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(current)) = ready.pop() {
        order.push(current);
        for &dependent in &nodes[current].dependents {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }
    order
}

fn cycle_error(
    requirements: &[Requirement],
    relations: &RequirementRelations,
    index: &HashMap<Uuid, usize>,
) -> ForestError {
    let mut cycles: Vec<Vec<usize>> = tarjan_scc(relations.dependency_graph())
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            let mut members: Vec<usize> = component.iter().map(|id| index[id]).collect();
            members.sort_unstable();
            members
        })
        .collect();
    cycles.sort();

    let members = cycles
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|i| (&requirements[i]).into())
        .collect();
    ForestError::Cycle { members }
}

/// Group nodes into weakly connected components of the dependency relation.
fn partition(nodes: &[TreeNode]) -> (Vec<Span>, Vec<usize>) {
    let mut components = UnionFind::<usize>::new(nodes.len());
    for node in nodes {
        for &dependency in &node.dependencies {
            components.union(node.index, dependency);
        }
    }

    let mut representatives = HashMap::new();
    let mut trees: Vec<Span> = Vec::new();
    let mut membership = Vec::with_capacity(nodes.len());

    for node in nodes {
        let tree = *representatives
            .entry(components.find(node.index))
            .or_insert_with(|| {
                trees.push(Span {
                    members: Vec::new(),
                    roots: Vec::new(),
                });
                trees.len() - 1
            });

        trees[tree].members.push(node.index);
        if node.is_root() {
            trees[tree].roots.push(node.index);
        }
        membership.push(tree);
    }

    (trees, membership)
}
