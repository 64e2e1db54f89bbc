use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{
    Contribution, ContributionFilter, ContributionId, ContributionStatus, ContributionSubmission,
    ProposedChange, ReviewRecord,
};
use super::repository::ContributionRepository;
use super::review::{self, ContributionViolation};
use crate::activity::{ActivityKind, ActivityRecorder, ActivityRepository, ActivitySubject};
use crate::audit::{AuditStamp, Audited, IdSequence, UserId};
use crate::messaging::{NotificationKind, Notifier};
use crate::records::{
    FamilyRecordService, FamilyRepository, NewParentChild, NewPartnership, PartnershipStatus,
    Person, RecordServiceError,
};
use crate::store::RepositoryError;

static CONTRIBUTION_SEQUENCE: IdSequence = IdSequence::new("con");

/// Service running the propose, review, apply workflow for crowd-sourced edits.
pub struct ContributionService<C, F, A, N> {
    repository: Arc<C>,
    records: Arc<FamilyRecordService<F, A>>,
    activity: Arc<ActivityRecorder<A>>,
    notifier: Arc<N>,
}

impl<C, F, A, N> ContributionService<C, F, A, N>
where
    C: ContributionRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        repository: Arc<C>,
        records: Arc<FamilyRecordService<F, A>>,
        activity: Arc<ActivityRecorder<A>>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            repository,
            records,
            activity,
            notifier,
        }
    }

    /// Store a proposal and tell the person's editors it is waiting.
    pub fn submit(
        &self,
        actor: &UserId,
        submission: ContributionSubmission,
    ) -> Result<Contribution, ContributionServiceError> {
        let person = self.records.get_person(&submission.person)?;
        let current_value = review::snapshot(&person, &submission.change)?;
        match &submission.change {
            ProposedChange::AddParent { parent: other, .. }
            | ProposedChange::AddPartner { partner: other, .. } => {
                self.records.get_person(other)?;
            }
            ProposedChange::UpdateField { .. } => {}
        }

        let duplicate = self.repository.contributions()?.into_iter().any(|existing| {
            existing.is_pending()
                && &existing.submitted_by == actor
                && existing.person == submission.person
                && review::same_proposal(&existing.change, &submission.change)
        });
        if duplicate {
            return Err(ContributionServiceError::Conflict(format!(
                "an identical proposal for {} is already pending",
                person.id
            )));
        }

        let now = Utc::now();
        let contribution = Contribution {
            id: ContributionId(CONTRIBUTION_SEQUENCE.next_id()),
            person: submission.person,
            change: submission.change,
            current_value,
            note: submission
                .note
                .map(|note| note.trim().to_string())
                .filter(|note| !note.is_empty()),
            status: ContributionStatus::Pending,
            submitted_by: actor.clone(),
            submitted_at: now,
            review: None,
            audit: AuditStamp::created(actor, now),
        };
        let stored = self.repository.insert_contribution(contribution)?;

        self.activity.record_or_warn(
            actor,
            ActivityKind::ContributionSubmitted,
            ActivitySubject::Contribution(stored.id.0.clone()),
            format!(
                "proposed to {} for {}",
                stored.change.describe(),
                person.display_name()
            ),
        );
        for reviewer in self.records.reviewers_of(&person)? {
            if &reviewer == actor {
                continue;
            }
            self.notify_or_warn(
                &reviewer,
                NotificationKind::ContributionPending,
                format!(
                    "{actor} proposed to {} for {}",
                    stored.change.describe(),
                    person.display_name()
                ),
                &stored.id,
            );
        }
        info!(contribution_id = %stored.id, %actor, person_id = %stored.person, "contribution submitted");
        Ok(stored)
    }

    /// Apply a pending proposal to the record and credit both parties.
    pub fn approve(
        &self,
        reviewer: &UserId,
        id: &ContributionId,
        note: Option<String>,
    ) -> Result<Contribution, ContributionServiceError> {
        let pending = self.live_contribution(id)?;
        ensure_transition(&pending, ContributionStatus::Approved)?;
        let person = self.reviewable_person(reviewer, &pending)?;
        if matches!(pending.change, ProposedChange::UpdateField { .. })
            && review::is_stale(&person, &pending)
        {
            return Err(ContributionServiceError::Stale(id.clone()));
        }

        // Claim the decision first so a concurrent withdraw or review loses.
        let contribution = self.decide(&pending, reviewer, ContributionStatus::Approved, note)?;
        if let Err(err) = self.apply(reviewer, &person, &pending.change) {
            if let Err(reopen) = self
                .repository
                .transition_contribution(pending, ContributionStatus::Approved)
            {
                warn!(
                    contribution_id = %id,
                    error = %reopen,
                    "failed to reopen contribution after apply error"
                );
            }
            return Err(err);
        }

        let subject = ActivitySubject::Contribution(contribution.id.0.clone());
        self.activity.record_or_warn(
            &contribution.submitted_by,
            ActivityKind::ContributionApproved,
            subject.clone(),
            format!(
                "proposal to {} for {} was approved",
                contribution.change.describe(),
                person.display_name()
            ),
        );
        self.activity.record_or_warn(
            reviewer,
            ActivityKind::ContributionReviewed,
            subject,
            format!("approved a proposal for {}", person.display_name()),
        );
        self.notify_or_warn(
            &contribution.submitted_by,
            NotificationKind::ContributionApproved,
            format!(
                "{reviewer} approved your proposal to {} for {}",
                contribution.change.describe(),
                person.display_name()
            ),
            &contribution.id,
        );
        info!(contribution_id = %contribution.id, %reviewer, "contribution approved");
        Ok(contribution)
    }

    pub fn reject(
        &self,
        reviewer: &UserId,
        id: &ContributionId,
        reason: &str,
    ) -> Result<Contribution, ContributionServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ContributionViolation::BlankReason.into());
        }
        let pending = self.live_contribution(id)?;
        ensure_transition(&pending, ContributionStatus::Rejected)?;
        let person = self.reviewable_person(reviewer, &pending)?;

        let contribution = self.decide(
            &pending,
            reviewer,
            ContributionStatus::Rejected,
            Some(reason.to_string()),
        )?;

        self.activity.record_or_warn(
            reviewer,
            ActivityKind::ContributionReviewed,
            ActivitySubject::Contribution(contribution.id.0.clone()),
            format!("rejected a proposal for {}", person.display_name()),
        );
        self.notify_or_warn(
            &contribution.submitted_by,
            NotificationKind::ContributionRejected,
            format!(
                "{reviewer} rejected your proposal for {}: {reason}",
                person.display_name()
            ),
            &contribution.id,
        );
        info!(contribution_id = %contribution.id, %reviewer, "contribution rejected");
        Ok(contribution)
    }

    pub fn withdraw(
        &self,
        actor: &UserId,
        id: &ContributionId,
    ) -> Result<Contribution, ContributionServiceError> {
        let pending = self.live_contribution(id)?;
        if &pending.submitted_by != actor {
            return Err(ContributionServiceError::Forbidden(format!(
                "only the contributor may withdraw {id}"
            )));
        }
        ensure_transition(&pending, ContributionStatus::Withdrawn)?;

        let mut contribution = pending.clone();
        contribution.status = ContributionStatus::Withdrawn;
        contribution.audit.touch(actor, Utc::now());
        self.claim(&contribution, pending.status)?;
        info!(contribution_id = %contribution.id, %actor, "contribution withdrawn");
        Ok(contribution)
    }

    pub fn get(&self, id: &ContributionId) -> Result<Contribution, ContributionServiceError> {
        self.live_contribution(id)
    }

    pub fn list(
        &self,
        filter: &ContributionFilter,
    ) -> Result<Vec<Contribution>, ContributionServiceError> {
        let mut contributions: Vec<_> = self
            .repository
            .contributions()?
            .into_iter()
            .filter(|contribution| filter.matches(contribution))
            .collect();
        contributions.sort_by(oldest_first);
        Ok(contributions)
    }

    /// Pending proposals the reviewer is allowed to decide, oldest first.
    pub fn reviewable_by(
        &self,
        reviewer: &UserId,
    ) -> Result<Vec<Contribution>, ContributionServiceError> {
        let mut reviewable = Vec::new();
        for contribution in self.repository.contributions()? {
            if !contribution.is_pending() || &contribution.submitted_by == reviewer {
                continue;
            }
            let person = match self.records.get_person(&contribution.person) {
                Ok(person) => person,
                Err(RecordServiceError::NotFound(_)) => continue,
                Err(err) => return Err(err.into()),
            };
            if self.records.can_edit(reviewer, &person)? {
                reviewable.push(contribution);
            }
        }
        reviewable.sort_by(oldest_first);
        Ok(reviewable)
    }

    fn live_contribution(
        &self,
        id: &ContributionId,
    ) -> Result<Contribution, ContributionServiceError> {
        self.repository
            .fetch_contribution(id)?
            .filter(Audited::is_live)
            .ok_or_else(|| ContributionServiceError::NotFound(id.clone()))
    }

    fn reviewable_person(
        &self,
        reviewer: &UserId,
        contribution: &Contribution,
    ) -> Result<Person, ContributionServiceError> {
        if &contribution.submitted_by == reviewer {
            return Err(ContributionViolation::SelfReview.into());
        }
        let person = self.records.get_person(&contribution.person)?;
        if !self.records.can_edit(reviewer, &person)? {
            return Err(ContributionServiceError::Forbidden(format!(
                "{reviewer} may not review changes to {}",
                person.id
            )));
        }
        Ok(person)
    }

    fn apply(
        &self,
        reviewer: &UserId,
        person: &Person,
        change: &ProposedChange,
    ) -> Result<(), ContributionServiceError> {
        match change.clone() {
            ProposedChange::UpdateField { field, value } => {
                self.records
                    .apply_person_field(reviewer, &person.id, field, value.as_deref())?;
            }
            ProposedChange::AddParent { parent, kind } => {
                self.records.link_parent_child(
                    reviewer,
                    NewParentChild {
                        parent,
                        child: person.id.clone(),
                        kind,
                    },
                )?;
            }
            ProposedChange::AddPartner { partner, kind } => {
                self.records.link_partnership(
                    reviewer,
                    NewPartnership {
                        first: person.id.clone(),
                        second: partner,
                        kind,
                        status: PartnershipStatus::Current,
                        started_on: None,
                        ended_on: None,
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Records the review decision, failing if the stored status moved on.
    fn decide(
        &self,
        pending: &Contribution,
        reviewer: &UserId,
        status: ContributionStatus,
        note: Option<String>,
    ) -> Result<Contribution, ContributionServiceError> {
        let now = Utc::now();
        let mut contribution = pending.clone();
        contribution.status = status;
        contribution.review = Some(ReviewRecord {
            reviewer: reviewer.clone(),
            decided_at: now,
            note: note
                .map(|note| note.trim().to_string())
                .filter(|note| !note.is_empty()),
        });
        contribution.audit.touch(reviewer, now);
        self.claim(&contribution, pending.status)?;
        Ok(contribution)
    }

    fn claim(
        &self,
        contribution: &Contribution,
        expected: ContributionStatus,
    ) -> Result<(), ContributionServiceError> {
        match self
            .repository
            .transition_contribution(contribution.clone(), expected)
        {
            Ok(()) => Ok(()),
            Err(RepositoryError::Conflict) => {
                let current = self.live_contribution(&contribution.id)?;
                Err(ContributionServiceError::InvalidTransition {
                    id: contribution.id.clone(),
                    from: current.status,
                    to: contribution.status,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn notify_or_warn(
        &self,
        user: &UserId,
        kind: NotificationKind,
        text: String,
        contribution: &ContributionId,
    ) {
        if let Err(err) = self
            .notifier
            .notify(user, kind, text, contribution.0.clone())
        {
            warn!(%user, ?kind, error = %err, "contribution notification failed");
        }
    }
}

fn oldest_first(a: &Contribution, b: &Contribution) -> std::cmp::Ordering {
    a.submitted_at
        .cmp(&b.submitted_at)
        .then_with(|| a.id.cmp(&b.id))
}

fn ensure_transition(
    contribution: &Contribution,
    next: ContributionStatus,
) -> Result<(), ContributionServiceError> {
    if contribution.status.can_transition(next) {
        Ok(())
    } else {
        Err(ContributionServiceError::InvalidTransition {
            id: contribution.id.clone(),
            from: contribution.status,
            to: next,
        })
    }
}

/// Error raised by the contribution service.
#[derive(Debug, thiserror::Error)]
pub enum ContributionServiceError {
    #[error(transparent)]
    Violation(#[from] ContributionViolation),
    #[error("contribution {0} not found")]
    NotFound(ContributionId),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("contribution {id} cannot move from {} to {}", .from.label(), .to.label())]
    InvalidTransition {
        id: ContributionId,
        from: ContributionStatus,
        to: ContributionStatus,
    },
    #[error("contribution {0} no longer matches the current record")]
    Stale(ContributionId),
    #[error(transparent)]
    Records(#[from] RecordServiceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
