use super::domain::{Message, MessageId, Notification, NotificationId, NotificationKind};
use chrono::{DateTime, Utc};

use crate::audit::UserId;
use crate::store::RepositoryError;

pub trait MessageRepository: Send + Sync {
    fn insert_message(&self, message: Message) -> Result<Message, RepositoryError>;
    /// Applies `change` to the stored message under the repository lock.
    fn modify_message<T, E: From<RepositoryError>>(
        &self,
        id: &MessageId,
        change: impl FnOnce(&mut Message) -> Result<T, E>,
    ) -> Result<T, E>;
    fn fetch_message(&self, id: &MessageId) -> Result<Option<Message>, RepositoryError>;
    fn messages(&self) -> Result<Vec<Message>, RepositoryError>;

    fn insert_notification(&self, notification: Notification) -> Result<(), RepositoryError>;
    fn modify_notification<T, E: From<RepositoryError>>(
        &self,
        id: &NotificationId,
        change: impl FnOnce(&mut Notification) -> Result<T, E>,
    ) -> Result<T, E>;
    /// Stamps every unread notification of the user in one step and returns
    /// how many changed.
    fn mark_notifications_read(
        &self,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError>;
    fn fetch_notification(
        &self,
        id: &NotificationId,
    ) -> Result<Option<Notification>, RepositoryError>;
    /// Notifications addressed to the user, in no particular order.
    fn notifications_for(&self, user: &UserId) -> Result<Vec<Notification>, RepositoryError>;
}

/// Outbound notification hook used by the contribution and content services.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        user: &UserId,
        kind: NotificationKind,
        text: String,
        subject: String,
    ) -> Result<(), RepositoryError>;
}
