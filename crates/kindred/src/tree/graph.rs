use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::audit::Audited;
use crate::records::{
    FamilyRepository, ParentChild, ParentKind, Partnership, Person, PersonId,
};
use crate::store::RepositoryError;

/// One hop along the family graph, read from the perspective of the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Move to one of the current person's parents.
    Parent,
    /// Move to one of the current person's children.
    Child,
    Partner,
}

/// Result of a breadth-first walk: minimal depth plus the hop that reached each person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Visit {
    pub depth: usize,
    pub via: Option<(PersonId, Step)>,
}

/// Adjacency lists rebuilt from live people and live relationship edges.
///
/// Edges touching a soft-deleted person are dropped so traversals never
/// surface deleted records.
#[derive(Debug, Clone, Default)]
pub struct FamilyGraph {
    people: BTreeMap<PersonId, Person>,
    parents: BTreeMap<PersonId, BTreeMap<PersonId, ParentKind>>,
    children: BTreeMap<PersonId, BTreeMap<PersonId, ParentKind>>,
    partners: BTreeMap<PersonId, BTreeMap<PersonId, Partnership>>,
}

impl FamilyGraph {
    pub fn build(
        people: Vec<Person>,
        links: Vec<ParentChild>,
        partnerships: Vec<Partnership>,
    ) -> Self {
        let mut graph = FamilyGraph {
            people: people
                .into_iter()
                .filter(Audited::is_live)
                .map(|person| (person.id.clone(), person))
                .collect(),
            ..FamilyGraph::default()
        };

        for link in links.into_iter().filter(Audited::is_live) {
            if !graph.contains(&link.parent) || !graph.contains(&link.child) {
                continue;
            }
            graph
                .parents
                .entry(link.child.clone())
                .or_default()
                .insert(link.parent.clone(), link.kind);
            graph
                .children
                .entry(link.parent)
                .or_default()
                .insert(link.child, link.kind);
        }

        for partnership in partnerships.into_iter().filter(Audited::is_live) {
            let (first, second) = partnership.partners.clone();
            if !graph.contains(&first) || !graph.contains(&second) {
                continue;
            }
            graph
                .partners
                .entry(first.clone())
                .or_default()
                .insert(second.clone(), partnership.clone());
            graph
                .partners
                .entry(second)
                .or_default()
                .insert(first, partnership);
        }

        graph
    }

    pub fn load<F: FamilyRepository + ?Sized>(repository: &F) -> Result<Self, RepositoryError> {
        Ok(Self::build(
            repository.people()?,
            repository.parent_child_links()?,
            repository.partnerships()?,
        ))
    }

    pub fn contains(&self, id: &PersonId) -> bool {
        self.people.contains_key(id)
    }

    pub fn person(&self, id: &PersonId) -> Option<&Person> {
        self.people.get(id)
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn parents_of(&self, id: &PersonId) -> impl Iterator<Item = (&PersonId, ParentKind)> {
        self.parents
            .get(id)
            .into_iter()
            .flat_map(|parents| parents.iter().map(|(parent, kind)| (parent, *kind)))
    }

    pub fn children_of(&self, id: &PersonId) -> impl Iterator<Item = (&PersonId, ParentKind)> {
        self.children
            .get(id)
            .into_iter()
            .flat_map(|children| children.iter().map(|(child, kind)| (child, *kind)))
    }

    pub fn partners_of(&self, id: &PersonId) -> impl Iterator<Item = (&PersonId, &Partnership)> {
        self.partners.get(id).into_iter().flat_map(|partners| partners.iter())
    }

    /// People sharing at least one parent with `id`, in id order.
    pub fn siblings_of(&self, id: &PersonId) -> Vec<&PersonId> {
        let mut siblings: Vec<&PersonId> = self
            .parents_of(id)
            .flat_map(|(parent, _)| self.children_of(parent).map(|(child, _)| child))
            .filter(|sibling| *sibling != id)
            .collect();
        siblings.sort();
        siblings.dedup();
        siblings
    }

    pub fn parent_kind(&self, child: &PersonId, parent: &PersonId) -> Option<ParentKind> {
        self.parents
            .get(child)
            .and_then(|parents| parents.get(parent))
            .copied()
    }

    pub fn partnership_between(&self, a: &PersonId, b: &PersonId) -> Option<&Partnership> {
        self.partners.get(a).and_then(|partners| partners.get(b))
    }

    /// Neighbours reachable in one hop: parents, then children, then partners.
    pub fn neighbors(&self, id: &PersonId) -> Vec<(&PersonId, Step)> {
        self.parents_of(id)
            .map(|(parent, _)| (parent, Step::Parent))
            .chain(self.children_of(id).map(|(child, _)| (child, Step::Child)))
            .chain(self.partners_of(id).map(|(partner, _)| (partner, Step::Partner)))
            .collect()
    }

    /// Breadth-first walk over every edge type, bounded by `max_depth` hops.
    pub(crate) fn walk(&self, start: &PersonId, max_depth: usize) -> BTreeMap<PersonId, Visit> {
        let mut visited = BTreeMap::new();
        if !self.contains(start) {
            return visited;
        }

        let mut queue = VecDeque::new();
        visited.insert(
            start.clone(),
            Visit {
                depth: 0,
                via: None,
            },
        );
        queue.push_back((start.clone(), 0usize));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (neighbor, step) in self.neighbors(&current) {
                if visited.contains_key(neighbor) {
                    continue;
                }
                visited.insert(
                    neighbor.clone(),
                    Visit {
                        depth: depth + 1,
                        via: Some((current.clone(), step)),
                    },
                );
                queue.push_back((neighbor.clone(), depth + 1));
            }
        }
        visited
    }

    /// Generations reachable by repeatedly following one direction.
    pub(crate) fn lineage(
        &self,
        start: &PersonId,
        direction: Step,
        generations: usize,
    ) -> Vec<(PersonId, usize)> {
        let mut seen = BTreeMap::new();
        let mut queue = VecDeque::new();
        queue.push_back((start.clone(), 0usize));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= generations {
                continue;
            }
            let next: Vec<&PersonId> = match direction {
                Step::Parent => self.parents_of(&current).map(|(id, _)| id).collect(),
                Step::Child => self.children_of(&current).map(|(id, _)| id).collect(),
                Step::Partner => self.partners_of(&current).map(|(id, _)| id).collect(),
            };
            for id in next {
                if id == start || seen.contains_key(id) {
                    continue;
                }
                seen.insert(id.clone(), depth + 1);
                queue.push_back((id.clone(), depth + 1));
            }
        }

        let mut reached: Vec<_> = seen.into_iter().collect();
        reached.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        reached
    }
}

/// Rebuild the path from `start` to `target` out of a finished walk.
pub(crate) fn trace_path(
    visits: &BTreeMap<PersonId, Visit>,
    target: &PersonId,
) -> Option<(Vec<PersonId>, Vec<Step>)> {
    let mut people = vec![target.clone()];
    let mut steps = Vec::new();
    let mut current = target;
    loop {
        let visit = visits.get(current)?;
        match &visit.via {
            None => break,
            Some((previous, step)) => {
                steps.push(*step);
                people.push(previous.clone());
                current = previous;
            }
        }
    }
    people.reverse();
    steps.reverse();
    Some((people, steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditStamp, UserId};
    use crate::records::{
        Gender, LifeEvent, ParentChildId, PartnershipId, PartnershipKind, PartnershipStatus,
    };
    use chrono::Utc;

    fn person(id: &str) -> Person {
        Person {
            id: PersonId(id.to_string()),
            given_name: id.to_string(),
            surname: "Lund".to_string(),
            maiden_name: None,
            nickname: None,
            gender: Gender::Unknown,
            birth: LifeEvent::default(),
            death: LifeEvent::default(),
            biography: None,
            living: true,
            audit: AuditStamp::created(&UserId::new("ada"), Utc::now()),
        }
    }

    fn link(parent: &str, child: &str) -> ParentChild {
        ParentChild {
            id: ParentChildId(format!("{parent}-{child}")),
            parent: PersonId(parent.to_string()),
            child: PersonId(child.to_string()),
            kind: ParentKind::Biological,
            audit: AuditStamp::created(&UserId::new("ada"), Utc::now()),
        }
    }

    fn partners(a: &str, b: &str) -> Partnership {
        Partnership {
            id: PartnershipId(format!("{a}+{b}")),
            partners: Partnership::normalized_pair(PersonId(a.to_string()), PersonId(b.to_string())),
            kind: PartnershipKind::Marriage,
            status: PartnershipStatus::Current,
            started_on: None,
            ended_on: None,
            audit: AuditStamp::created(&UserId::new("ada"), Utc::now()),
        }
    }

    fn id(value: &str) -> PersonId {
        PersonId(value.to_string())
    }

    #[test]
    fn edges_to_deleted_people_are_dropped() {
        let mut ghost = person("ghost");
        ghost
            .audit
            .soft_delete(&UserId::new("ada"), Utc::now());
        let graph = FamilyGraph::build(
            vec![person("mum"), person("kid"), ghost],
            vec![link("mum", "kid"), link("ghost", "kid")],
            vec![partners("mum", "ghost")],
        );

        assert_eq!(graph.len(), 2);
        let parents: Vec<_> = graph.parents_of(&id("kid")).map(|(p, _)| p.clone()).collect();
        assert_eq!(parents, vec![id("mum")]);
        assert_eq!(graph.partners_of(&id("mum")).count(), 0);
    }

    #[test]
    fn siblings_share_a_parent() {
        let graph = FamilyGraph::build(
            vec![person("mum"), person("a"), person("b"), person("c")],
            vec![link("mum", "a"), link("mum", "b")],
            Vec::new(),
        );
        assert_eq!(graph.siblings_of(&id("a")), vec![&id("b")]);
        assert!(graph.siblings_of(&id("c")).is_empty());
    }

    #[test]
    fn walk_records_minimal_depth_and_path() {
        let graph = FamilyGraph::build(
            vec![person("gran"), person("mum"), person("kid"), person("dad")],
            vec![link("gran", "mum"), link("mum", "kid")],
            vec![partners("mum", "dad")],
        );
        let visits = graph.walk(&id("kid"), 4);
        assert_eq!(visits[&id("gran")].depth, 2);
        assert_eq!(visits[&id("dad")].depth, 2);

        let (people, steps) = trace_path(&visits, &id("dad")).expect("path");
        assert_eq!(people, vec![id("kid"), id("mum"), id("dad")]);
        assert_eq!(steps, vec![Step::Parent, Step::Partner]);
    }

    #[test]
    fn walk_respects_depth_bound() {
        let graph = FamilyGraph::build(
            vec![person("gran"), person("mum"), person("kid")],
            vec![link("gran", "mum"), link("mum", "kid")],
            Vec::new(),
        );
        let visits = graph.walk(&id("kid"), 1);
        assert!(visits.contains_key(&id("mum")));
        assert!(!visits.contains_key(&id("gran")));
    }
}
