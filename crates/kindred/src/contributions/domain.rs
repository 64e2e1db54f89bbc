use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditStamp, Audited, UserId};
use crate::records::{ParentKind, PartnershipKind, PersonField, PersonId};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContributionId(pub String);

impl std::fmt::Display for ContributionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Edit a contributor proposes against one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposedChange {
    UpdateField {
        field: PersonField,
        #[serde(default)]
        value: Option<String>,
    },
    AddParent {
        parent: PersonId,
        #[serde(default)]
        kind: ParentKind,
    },
    AddPartner {
        partner: PersonId,
        #[serde(default)]
        kind: PartnershipKind,
    },
}

impl ProposedChange {
    pub fn describe(&self) -> String {
        match self {
            ProposedChange::UpdateField { field, value } => match value {
                Some(value) => format!("set {} to '{value}'", field.label()),
                None => format!("clear {}", field.label()),
            },
            ProposedChange::AddParent { parent, .. } => format!("add parent {parent}"),
            ProposedChange::AddPartner { partner, .. } => format!("add partner {partner}"),
        }
    }
}

/// Review lifecycle of a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

impl ContributionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ContributionStatus::Pending => "pending",
            ContributionStatus::Approved => "approved",
            ContributionStatus::Rejected => "rejected",
            ContributionStatus::Withdrawn => "withdrawn",
        }
    }

    /// Only pending contributions move, and only to a terminal status.
    pub fn can_transition(&self, next: ContributionStatus) -> bool {
        matches!(self, ContributionStatus::Pending) && next != ContributionStatus::Pending
    }
}

/// Outcome recorded when a reviewer approves or rejects a contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub reviewer: UserId,
    pub decided_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub id: ContributionId,
    pub person: PersonId,
    pub change: ProposedChange,
    /// Rendered value of the targeted field when the proposal was submitted.
    pub current_value: Option<String>,
    pub note: Option<String>,
    pub status: ContributionStatus,
    pub submitted_by: UserId,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewRecord>,
    pub audit: AuditStamp,
}

impl Contribution {
    pub fn is_pending(&self) -> bool {
        self.status == ContributionStatus::Pending
    }
}

impl Audited for Contribution {
    fn audit(&self) -> &AuditStamp {
        &self.audit
    }
}

/// Payload accepted when a contributor proposes a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionSubmission {
    pub person: PersonId,
    pub change: ProposedChange,
    #[serde(default)]
    pub note: Option<String>,
}

/// Optional filters applied by `ContributionService::list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContributionFilter {
    #[serde(default)]
    pub status: Option<ContributionStatus>,
    #[serde(default)]
    pub person: Option<PersonId>,
    #[serde(default)]
    pub contributor: Option<UserId>,
}

impl ContributionFilter {
    pub fn matches(&self, contribution: &Contribution) -> bool {
        self.status
            .map(|status| status == contribution.status)
            .unwrap_or(true)
            && self
                .person
                .as_ref()
                .map(|person| person == &contribution.person)
                .unwrap_or(true)
            && self
                .contributor
                .as_ref()
                .map(|user| user == &contribution.submitted_by)
                .unwrap_or(true)
    }
}
