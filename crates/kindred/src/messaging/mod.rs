//! Direct messages between users and the notification inbox other
//! services write to.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    Message, MessageId, MessageView, NewMessage, Notification, NotificationId, NotificationKind,
};
pub use repository::{MessageRepository, Notifier};
pub use router::messaging_router;
pub use service::{MessagingService, MessagingServiceError};
