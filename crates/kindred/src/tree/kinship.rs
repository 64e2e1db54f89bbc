//! Human-readable kinship labels for a path through the family graph.

use super::graph::{FamilyGraph, Step};
use crate::records::{Gender, ParentKind, PartnershipKind, PartnershipStatus, PersonId};

/// Label the relationship of `people.last()` to `people[0]`.
///
/// `people` holds every person on the path, so `people.len() == steps.len() + 1`.
pub fn describe(graph: &FamilyGraph, people: &[PersonId], steps: &[Step]) -> String {
    let (Some(first), Some(last)) = (people.first(), people.last()) else {
        return "unrelated".to_string();
    };
    let gender = gender_of(graph, last);

    match steps {
        [] => "self".to_string(),
        [Step::Partner] => partner_label(graph, first, last, gender),
        [Step::Parent] if graph.parent_kind(first, last) == Some(ParentKind::Step) => {
            gendered(gender, "step-parent", "stepmother", "stepfather")
        }
        [Step::Child] if graph.parent_kind(last, first) == Some(ParentKind::Step) => {
            gendered(gender, "step-child", "stepdaughter", "stepson")
        }
        [Step::Partner, Step::Parent] => {
            gendered(gender, "parent-in-law", "mother-in-law", "father-in-law")
        }
        [Step::Child, Step::Partner] => {
            gendered(gender, "child-in-law", "daughter-in-law", "son-in-law")
        }
        [Step::Partner, Step::Parent, Step::Child] | [Step::Parent, Step::Child, Step::Partner] => {
            gendered(gender, "sibling-in-law", "sister-in-law", "brother-in-law")
        }
        [Step::Parent, Step::Partner] => gendered(gender, "step-parent", "stepmother", "stepfather"),
        [Step::Partner, Step::Child] => gendered(gender, "step-child", "stepdaughter", "stepson"),
        _ => match blood_shape(steps) {
            Some((up, down)) => blood_label(up, down, gender),
            None => possessive_chain(graph, people, steps),
        },
    }
}

/// `(ups, downs)` when the path climbs then descends without partner hops.
fn blood_shape(steps: &[Step]) -> Option<(usize, usize)> {
    let up = steps.iter().take_while(|step| **step == Step::Parent).count();
    let rest = &steps[up..];
    if rest.iter().all(|step| *step == Step::Child) {
        Some((up, rest.len()))
    } else {
        None
    }
}

fn blood_label(up: usize, down: usize, gender: Gender) -> String {
    match (up, down) {
        (0, 0) => "self".to_string(),
        (1, 0) => gendered(gender, "parent", "mother", "father"),
        (up, 0) => {
            let prefix = format!("{}grand", "great-".repeat(up - 2));
            format!("{prefix}{}", gendered(gender, "parent", "mother", "father"))
        }
        (0, 1) => gendered(gender, "child", "daughter", "son"),
        (0, down) => {
            let prefix = format!("{}grand", "great-".repeat(down - 2));
            format!("{prefix}{}", gendered(gender, "child", "daughter", "son"))
        }
        (1, 1) => gendered(gender, "sibling", "sister", "brother"),
        (1, down) => {
            let prefix = if down == 2 {
                String::new()
            } else {
                format!("{}grand", "great-".repeat(down - 3))
            };
            format!("{prefix}{}", gendered(gender, "niece/nephew", "niece", "nephew"))
        }
        (up, 1) => format!(
            "{}{}",
            "great-".repeat(up - 2),
            gendered(gender, "aunt/uncle", "aunt", "uncle")
        ),
        (up, down) => cousin_label(up.min(down) - 1, up.abs_diff(down)),
    }
}

fn cousin_label(degree: usize, removed: usize) -> String {
    let ordinal = match degree {
        1 => "first".to_string(),
        2 => "second".to_string(),
        3 => "third".to_string(),
        n => format!("{n}th"),
    };
    match removed {
        0 => format!("{ordinal} cousin"),
        1 => format!("{ordinal} cousin once removed"),
        2 => format!("{ordinal} cousin twice removed"),
        n => format!("{ordinal} cousin {n} times removed"),
    }
}

fn partner_label(graph: &FamilyGraph, from: &PersonId, to: &PersonId, gender: Gender) -> String {
    let Some(partnership) = graph.partnership_between(from, to) else {
        return "partner".to_string();
    };
    let base = match partnership.kind {
        PartnershipKind::Marriage | PartnershipKind::CivilUnion => {
            gendered(gender, "spouse", "wife", "husband")
        }
        PartnershipKind::Partner => "partner".to_string(),
    };
    match partnership.status {
        PartnershipStatus::Divorced | PartnershipStatus::Separated => format!("former {base}"),
        PartnershipStatus::Current | PartnershipStatus::Widowed => base,
    }
}

/// Break the path into partner hops and climb-then-descend runs and label each.
fn possessive_chain(graph: &FamilyGraph, people: &[PersonId], steps: &[Step]) -> String {
    let mut parts = Vec::new();
    let mut start = 0;
    while start < steps.len() {
        let end = if steps[start] == Step::Partner {
            start + 1
        } else {
            let up = steps[start..]
                .iter()
                .take_while(|step| **step == Step::Parent)
                .count();
            let down = steps[start + up..]
                .iter()
                .take_while(|step| **step == Step::Child)
                .count();
            start + up + down
        };
        parts.push(describe(graph, &people[start..=end], &steps[start..end]));
        start = end;
    }
    parts.join("'s ")
}

fn gender_of(graph: &FamilyGraph, id: &PersonId) -> Gender {
    graph
        .person(id)
        .map(|person| person.gender)
        .unwrap_or_default()
}

fn gendered(gender: Gender, neutral: &str, female: &str, male: &str) -> String {
    match gender {
        Gender::Female => female,
        Gender::Male => male,
        Gender::Other | Gender::Unknown => neutral,
    }
    .to_string()
}
