use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{IdSequence, UserId};

static NOTIFICATION_SEQUENCE: IdSequence = IdSequence::new("ntf");

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

/// Direct message between archive users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: UserId,
    pub recipients: Vec<UserId>,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read_by: BTreeSet<UserId>,
}

impl Message {
    pub fn is_recipient(&self, user: &UserId) -> bool {
        self.recipients.contains(user)
    }

    pub fn view_for(&self, user: &UserId) -> MessageView {
        MessageView {
            id: self.id.clone(),
            sender: self.sender.clone(),
            recipients: self.recipients.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            sent_at: self.sent_at,
            read: self.read_by.contains(user) || &self.sender == user,
        }
    }
}

/// Per-reader projection of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub id: MessageId,
    pub sender: UserId,
    pub recipients: Vec<UserId>,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub recipients: Vec<UserId>,
    #[serde(default)]
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ContributionPending,
    ContributionApproved,
    ContributionRejected,
    CommentPosted,
    MessageReceived,
}

/// In-app notice addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user: UserId,
    pub kind: NotificationKind,
    pub text: String,
    /// Id of the record the notification links to.
    pub subject: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(user: &UserId, kind: NotificationKind, text: String, subject: String) -> Self {
        Self {
            id: NotificationId(NOTIFICATION_SEQUENCE.next_id()),
            user: user.clone(),
            kind,
            text,
            subject,
            created_at: Utc::now(),
            read_at: None,
        }
    }

    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}
