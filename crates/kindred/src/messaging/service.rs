use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{
    Message, MessageId, MessageView, NewMessage, Notification, NotificationId, NotificationKind,
};
use super::repository::{MessageRepository, Notifier};
use crate::activity::{ActivityKind, ActivityRecorder, ActivityRepository, ActivitySubject};
use crate::audit::{IdSequence, UserId};
use crate::store::RepositoryError;

static MESSAGE_SEQUENCE: IdSequence = IdSequence::new("msg");

/// Direct messages and the per-user notification inbox.
pub struct MessagingService<M, A> {
    repository: Arc<M>,
    activity: Arc<ActivityRecorder<A>>,
}

impl<M, A> MessagingService<M, A>
where
    M: MessageRepository + Notifier + 'static,
    A: ActivityRepository + 'static,
{
    pub fn new(repository: Arc<M>, activity: Arc<ActivityRecorder<A>>) -> Self {
        Self {
            repository,
            activity,
        }
    }

    pub fn send(
        &self,
        sender: &UserId,
        message: NewMessage,
    ) -> Result<MessageView, MessagingServiceError> {
        let body = message.body.trim().to_string();
        if body.is_empty() {
            return Err(MessagingServiceError::EmptyBody);
        }

        let mut seen = BTreeSet::new();
        let recipients: Vec<UserId> = message
            .recipients
            .into_iter()
            .map(|user| UserId(user.0.trim().to_string()))
            .filter(|user| !user.0.is_empty() && user != sender)
            .filter(|user| seen.insert(user.clone()))
            .collect();
        if recipients.is_empty() {
            return Err(MessagingServiceError::NoRecipients);
        }

        let stored = self.repository.insert_message(Message {
            id: MessageId(MESSAGE_SEQUENCE.next_id()),
            sender: sender.clone(),
            recipients,
            subject: message.subject.trim().to_string(),
            body,
            sent_at: Utc::now(),
            read_by: BTreeSet::new(),
        })?;

        for recipient in &stored.recipients {
            let text = if stored.subject.is_empty() {
                format!("New message from {}", sender)
            } else {
                format!("New message from {}: {}", sender, stored.subject)
            };
            if let Err(err) = self.repository.notify(
                recipient,
                NotificationKind::MessageReceived,
                text,
                stored.id.0.clone(),
            ) {
                warn!(%recipient, error = %err, "message notification failed");
            }
        }

        self.activity.record_or_warn(
            sender,
            ActivityKind::MessageSent,
            ActivitySubject::Message(stored.id.0.clone()),
            format!("sent a message to {} recipient(s)", stored.recipients.len()),
        );
        info!(message_id = %stored.id.0, %sender, "message sent");

        Ok(stored.view_for(sender))
    }

    /// Messages addressed to the user, newest first.
    pub fn inbox(&self, user: &UserId) -> Result<Vec<MessageView>, MessagingServiceError> {
        let mut messages: Vec<_> = self
            .repository
            .messages()?
            .into_iter()
            .filter(|message| message.is_recipient(user))
            .map(|message| message.view_for(user))
            .collect();
        messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then_with(|| b.id.cmp(&a.id)));
        Ok(messages)
    }

    pub fn sent(&self, user: &UserId) -> Result<Vec<MessageView>, MessagingServiceError> {
        let mut messages: Vec<_> = self
            .repository
            .messages()?
            .into_iter()
            .filter(|message| &message.sender == user)
            .map(|message| message.view_for(user))
            .collect();
        messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then_with(|| b.id.cmp(&a.id)));
        Ok(messages)
    }

    pub fn mark_message_read(
        &self,
        user: &UserId,
        id: &MessageId,
    ) -> Result<MessageView, MessagingServiceError> {
        let outcome = self.repository.modify_message(id, |message| {
            if !message.is_recipient(user) {
                return Err(MessagingServiceError::Forbidden);
            }
            message.read_by.insert(user.clone());
            Ok(message.view_for(user))
        });
        found(outcome)
    }

    pub fn notifications(
        &self,
        user: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, MessagingServiceError> {
        let mut notifications: Vec<_> = self
            .repository
            .notifications_for(user)?
            .into_iter()
            .filter(|notification| !unread_only || notification.is_unread())
            .collect();
        notifications.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(notifications)
    }

    pub fn unread_count(&self, user: &UserId) -> Result<usize, MessagingServiceError> {
        Ok(self
            .repository
            .notifications_for(user)?
            .iter()
            .filter(|notification| notification.is_unread())
            .count())
    }

    pub fn mark_notification_read(
        &self,
        user: &UserId,
        id: &NotificationId,
    ) -> Result<Notification, MessagingServiceError> {
        let outcome = self.repository.modify_notification(id, |notification| {
            if &notification.user != user {
                return Err(MessagingServiceError::Forbidden);
            }
            if notification.read_at.is_none() {
                notification.read_at = Some(Utc::now());
            }
            Ok(notification.clone())
        });
        found(outcome)
    }

    /// Returns how many notifications changed state.
    pub fn mark_all_read(&self, user: &UserId) -> Result<usize, MessagingServiceError> {
        Ok(self
            .repository
            .mark_notifications_read(user, Utc::now())?)
    }
}

fn found<T>(outcome: Result<T, MessagingServiceError>) -> Result<T, MessagingServiceError> {
    match outcome {
        Err(MessagingServiceError::Repository(RepositoryError::NotFound)) => {
            Err(MessagingServiceError::NotFound)
        }
        other => other,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MessagingServiceError {
    #[error("message body must not be empty")]
    EmptyBody,
    #[error("message needs at least one recipient other than the sender")]
    NoRecipients,
    #[error("message or notification not found")]
    NotFound,
    #[error("not addressed to the caller")]
    Forbidden,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
