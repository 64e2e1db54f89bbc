use super::domain::{Comment, CommentId, ContentId, ContentItem};
use crate::store::RepositoryError;

/// Storage for shared content and the comments attached to it.
pub trait ContentRepository: Send + Sync {
    fn insert_content(&self, item: ContentItem) -> Result<ContentItem, RepositoryError>;
    /// Applies `change` to the stored item under the repository lock.
    fn modify_content<T, E: From<RepositoryError>>(
        &self,
        id: &ContentId,
        change: impl FnOnce(&mut ContentItem) -> Result<T, E>,
    ) -> Result<T, E>;
    fn fetch_content(&self, id: &ContentId) -> Result<Option<ContentItem>, RepositoryError>;
    /// Live items; callers order them.
    fn contents(&self) -> Result<Vec<ContentItem>, RepositoryError>;

    fn insert_comment(&self, comment: Comment) -> Result<Comment, RepositoryError>;
    fn update_comment(&self, comment: Comment) -> Result<(), RepositoryError>;
    fn fetch_comment(&self, id: &CommentId) -> Result<Option<Comment>, RepositoryError>;
    /// Live comments on one item.
    fn comments_for(&self, content: &ContentId) -> Result<Vec<Comment>, RepositoryError>;
}
