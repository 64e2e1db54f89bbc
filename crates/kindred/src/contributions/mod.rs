//! Crowd-sourced edits to genealogical facts: proposals, review, and the
//! scoring and notification side effects of each decision.

pub mod domain;
pub mod repository;
pub(crate) mod review;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Contribution, ContributionFilter, ContributionId, ContributionStatus, ContributionSubmission,
    ProposedChange, ReviewRecord,
};
pub use repository::ContributionRepository;
pub use review::ContributionViolation;
pub use router::contribution_router;
pub use service::{ContributionService, ContributionServiceError};
