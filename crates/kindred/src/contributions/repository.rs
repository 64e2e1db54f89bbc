use super::domain::{Contribution, ContributionId, ContributionStatus};
use crate::store::RepositoryError;

/// Storage abstraction for contributions so the service can be exercised in isolation.
pub trait ContributionRepository: Send + Sync {
    fn insert_contribution(
        &self,
        contribution: Contribution,
    ) -> Result<Contribution, RepositoryError>;
    /// Replaces the stored row only while its status is still `expected`;
    /// `Conflict` when another decision got there first.
    fn transition_contribution(
        &self,
        contribution: Contribution,
        expected: ContributionStatus,
    ) -> Result<(), RepositoryError>;
    fn fetch_contribution(
        &self,
        id: &ContributionId,
    ) -> Result<Option<Contribution>, RepositoryError>;
    fn contributions(&self) -> Result<Vec<Contribution>, RepositoryError>;
}
