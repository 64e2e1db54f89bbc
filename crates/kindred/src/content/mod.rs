//! Stories, recipes, traditions, wiki pages, and media shared with the
//! family, plus their comment threads.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    Comment, CommentId, ContentFilter, ContentId, ContentItem, ContentKind, ContentUpdate,
    MediaDescriptor, MediaUpload, NewComment, NewContent,
};
pub use repository::ContentRepository;
pub use router::content_router;
pub use service::{ContentService, ContentServiceError, ContentViolation};
