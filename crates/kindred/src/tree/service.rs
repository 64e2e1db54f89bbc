use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::graph::{trace_path, FamilyGraph, Step};
use super::kinship;
use crate::records::{
    FamilyRepository, ParentKind, PartnershipKind, PartnershipStatus, PersonId, PersonSummary,
};
use crate::store::RepositoryError;

pub const DEFAULT_MINI_TREE_GENERATIONS: u8 = 2;
pub const DEFAULT_RELATIVE_DEGREE: usize = 3;

/// Error raised by tree queries.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("person {0} not found")]
    NotFound(PersonId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeRole {
    Focus,
    Ancestor,
    Descendant,
    Partner,
    Sibling,
}

impl TreeRole {
    pub const fn label(self) -> &'static str {
        match self {
            TreeRole::Focus => "focus",
            TreeRole::Ancestor => "ancestor",
            TreeRole::Descendant => "descendant",
            TreeRole::Partner => "partner",
            TreeRole::Sibling => "sibling",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub person: PersonSummary,
    /// Positive above the focus, negative below, zero on the focus's own row.
    pub generation: i32,
    pub role: TreeRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeEdge {
    ParentChild {
        parent: PersonId,
        child: PersonId,
        kind: ParentKind,
    },
    Partnership {
        first: PersonId,
        second: PersonId,
        kind: PartnershipKind,
        status: PartnershipStatus,
    },
}

/// Compact pedigree around one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiniTree {
    pub focus: PersonId,
    pub generations_up: u8,
    pub generations_down: u8,
    pub nodes: Vec<TreeNode>,
    pub edges: Vec<TreeEdge>,
}

impl MiniTree {
    pub fn node(&self, id: &PersonId) -> Option<&TreeNode> {
        self.nodes.iter().find(|node| &node.person.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relative {
    pub person: PersonSummary,
    pub degree: usize,
    pub label: String,
}

/// Shortest connection between two people.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub from: PersonSummary,
    pub to: PersonSummary,
    pub path: Vec<PersonSummary>,
    pub steps: Vec<Step>,
    pub degree: usize,
    /// How `to` relates to `from`, e.g. "grandmother" or "wife's first cousin".
    pub label: String,
}

/// Read-only traversals over the family graph.
pub struct TreeService<F> {
    repository: Arc<F>,
    max_generations: u8,
}

impl<F> TreeService<F>
where
    F: FamilyRepository + 'static,
{
    pub fn new(repository: Arc<F>, max_generations: u8) -> Self {
        Self {
            repository,
            max_generations: max_generations.max(1),
        }
    }

    pub fn max_generations(&self) -> u8 {
        self.max_generations
    }

    /// Longest path the relationship search will explore.
    pub fn max_path_len(&self) -> usize {
        2 * usize::from(self.max_generations) + 2
    }

    pub fn mini_tree(
        &self,
        focus: &PersonId,
        up: Option<u8>,
        down: Option<u8>,
    ) -> Result<MiniTree, TreeError> {
        let graph = self.graph_containing(focus)?;
        let up = up
            .unwrap_or(DEFAULT_MINI_TREE_GENERATIONS)
            .min(self.max_generations);
        let down = down
            .unwrap_or(DEFAULT_MINI_TREE_GENERATIONS)
            .min(self.max_generations);

        let mut placed: BTreeMap<PersonId, (i32, TreeRole)> = BTreeMap::new();
        placed.insert(focus.clone(), (0, TreeRole::Focus));
        for (id, depth) in graph.lineage(focus, Step::Parent, usize::from(up)) {
            placed.entry(id).or_insert((depth as i32, TreeRole::Ancestor));
        }
        for (id, depth) in graph.lineage(focus, Step::Child, usize::from(down)) {
            placed
                .entry(id)
                .or_insert((-(depth as i32), TreeRole::Descendant));
        }
        for (partner, _) in graph.partners_of(focus) {
            placed
                .entry(partner.clone())
                .or_insert((0, TreeRole::Partner));
        }
        for sibling in graph.siblings_of(focus) {
            placed
                .entry(sibling.clone())
                .or_insert((0, TreeRole::Sibling));
        }

        let mut nodes: Vec<TreeNode> = placed
            .iter()
            .filter_map(|(id, (generation, role))| {
                graph.person(id).map(|person| TreeNode {
                    person: person.summary(),
                    generation: *generation,
                    role: *role,
                })
            })
            .collect();
        nodes.sort_by(|a, b| {
            b.generation
                .cmp(&a.generation)
                .then_with(|| a.person.id.cmp(&b.person.id))
        });

        let mut edges = Vec::new();
        for id in placed.keys() {
            for (child, kind) in graph.children_of(id) {
                if placed.contains_key(child) {
                    edges.push(TreeEdge::ParentChild {
                        parent: id.clone(),
                        child: child.clone(),
                        kind,
                    });
                }
            }
            for (partner, partnership) in graph.partners_of(id) {
                if id < partner && placed.contains_key(partner) {
                    edges.push(TreeEdge::Partnership {
                        first: id.clone(),
                        second: partner.clone(),
                        kind: partnership.kind,
                        status: partnership.status,
                    });
                }
            }
        }

        Ok(MiniTree {
            focus: focus.clone(),
            generations_up: up,
            generations_down: down,
            nodes,
            edges,
        })
    }

    /// Everyone reachable within `degree` hops, nearest first.
    pub fn relatives_within(
        &self,
        focus: &PersonId,
        degree: Option<usize>,
    ) -> Result<Vec<Relative>, TreeError> {
        let graph = self.graph_containing(focus)?;
        let degree = degree
            .unwrap_or(DEFAULT_RELATIVE_DEGREE)
            .min(self.max_path_len());
        let visits = graph.walk(focus, degree);

        let mut relatives: Vec<Relative> = visits
            .iter()
            .filter(|(id, _)| *id != focus)
            .filter_map(|(id, visit)| {
                let person = graph.person(id)?;
                let (people, steps) = trace_path(&visits, id)?;
                Some(Relative {
                    person: person.summary(),
                    degree: visit.depth,
                    label: kinship::describe(&graph, &people, &steps),
                })
            })
            .collect();
        relatives.sort_by(|a, b| {
            a.degree
                .cmp(&b.degree)
                .then_with(|| a.person.id.cmp(&b.person.id))
        });
        Ok(relatives)
    }

    /// Shortest connection from `from` to `to`, or `None` when they are unconnected.
    pub fn relationship(
        &self,
        from: &PersonId,
        to: &PersonId,
    ) -> Result<Option<Relationship>, TreeError> {
        let graph = self.graph_containing(from)?;
        if !graph.contains(to) {
            return Err(TreeError::NotFound(to.clone()));
        }

        let visits = graph.walk(from, self.max_path_len());
        let Some((people, steps)) = trace_path(&visits, to) else {
            return Ok(None);
        };
        let label = kinship::describe(&graph, &people, &steps);
        let path: Vec<PersonSummary> = people
            .iter()
            .filter_map(|id| graph.person(id).map(|person| person.summary()))
            .collect();
        let (Some(first), Some(last)) = (path.first().cloned(), path.last().cloned()) else {
            return Ok(None);
        };

        Ok(Some(Relationship {
            from: first,
            to: last,
            degree: steps.len(),
            path,
            steps,
            label,
        }))
    }

    fn graph_containing(&self, focus: &PersonId) -> Result<FamilyGraph, TreeError> {
        let graph = FamilyGraph::load(self.repository.as_ref())?;
        if graph.contains(focus) {
            Ok(graph)
        } else {
            Err(TreeError::NotFound(focus.clone()))
        }
    }
}
