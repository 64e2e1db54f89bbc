use super::domain::ActivityFeedItem;
use crate::store::RepositoryError;

/// Append-only log of feed entries.
pub trait ActivityRepository: Send + Sync {
    fn append(&self, item: ActivityFeedItem) -> Result<(), RepositoryError>;
    /// All entries in insertion order.
    fn items(&self) -> Result<Vec<ActivityFeedItem>, RepositoryError>;
}
