//! Checks applied to proposals before they are stored and again before an
//! approval writes them into the record.

use super::domain::{Contribution, ProposedChange};
use crate::records::{Person, PersonField};

/// Reasons a proposal or review decision is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContributionViolation {
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("{field} must not be blank")]
    BlankName { field: &'static str },
    #[error("proposed value matches the current record")]
    Unchanged,
    #[error("a person cannot be linked to themselves")]
    SelfRelationship,
    #[error("contributors may not review their own proposals")]
    SelfReview,
    #[error("a rejection needs a reason")]
    BlankReason,
}

/// Validate a proposal against the person it targets and return the
/// current value of the targeted field, which is kept as a snapshot.
pub fn snapshot(
    person: &Person,
    change: &ProposedChange,
) -> Result<Option<String>, ContributionViolation> {
    match change {
        ProposedChange::UpdateField { field, value } => {
            let proposed = proposed_value(*field, value.as_deref())?;
            let current = person.field_value(*field);
            if proposed == current {
                return Err(ContributionViolation::Unchanged);
            }
            Ok(current)
        }
        ProposedChange::AddParent { parent: other, .. }
        | ProposedChange::AddPartner { partner: other, .. } => {
            if other == &person.id {
                return Err(ContributionViolation::SelfRelationship);
            }
            Ok(None)
        }
    }
}

/// Canonical text of a proposed field value.
pub fn proposed_value(
    field: PersonField,
    raw: Option<&str>,
) -> Result<Option<String>, ContributionViolation> {
    let parsed = field
        .parse_value(raw)
        .map_err(|reason| ContributionViolation::InvalidField {
            field: field.label(),
            reason,
        })?;
    let rendered = field.render(&parsed);
    if matches!(field, PersonField::GivenName | PersonField::Surname) && rendered.is_none() {
        return Err(ContributionViolation::BlankName {
            field: field.label(),
        });
    }
    Ok(rendered)
}

/// True when a field proposal was made against a value that has since changed.
pub fn is_stale(person: &Person, contribution: &Contribution) -> bool {
    match &contribution.change {
        ProposedChange::UpdateField { field, .. } => {
            person.field_value(*field) != contribution.current_value
        }
        ProposedChange::AddParent { .. } | ProposedChange::AddPartner { .. } => false,
    }
}

/// Two proposals are the same when they would write the same thing.
pub fn same_proposal(a: &ProposedChange, b: &ProposedChange) -> bool {
    match (a, b) {
        (
            ProposedChange::UpdateField {
                field: field_a,
                value: value_a,
            },
            ProposedChange::UpdateField {
                field: field_b,
                value: value_b,
            },
        ) => {
            field_a == field_b
                && proposed_value(*field_a, value_a.as_deref()).ok()
                    == proposed_value(*field_b, value_b.as_deref()).ok()
        }
        (
            ProposedChange::AddParent { parent: parent_a, .. },
            ProposedChange::AddParent { parent: parent_b, .. },
        ) => parent_a == parent_b,
        (
            ProposedChange::AddPartner {
                partner: partner_a, ..
            },
            ProposedChange::AddPartner {
                partner: partner_b, ..
            },
        ) => partner_a == partner_b,
        _ => false,
    }
}
