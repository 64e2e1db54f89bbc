use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::UserId;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub String);

/// Actions that earn points on the activity feed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PersonAdded,
    PersonUpdated,
    RelationshipAdded,
    ContributionSubmitted,
    ContributionApproved,
    ContributionReviewed,
    ContentPublished,
    MediaUploaded,
    CommentPosted,
    MessageSent,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 10] = [
        ActivityKind::PersonAdded,
        ActivityKind::PersonUpdated,
        ActivityKind::RelationshipAdded,
        ActivityKind::ContributionSubmitted,
        ActivityKind::ContributionApproved,
        ActivityKind::ContributionReviewed,
        ActivityKind::ContentPublished,
        ActivityKind::MediaUploaded,
        ActivityKind::CommentPosted,
        ActivityKind::MessageSent,
    ];

    pub const fn default_points(self) -> u32 {
        match self {
            ActivityKind::PersonAdded => 10,
            ActivityKind::PersonUpdated => 2,
            ActivityKind::RelationshipAdded => 5,
            ActivityKind::ContributionSubmitted => 1,
            ActivityKind::ContributionApproved => 15,
            ActivityKind::ContributionReviewed => 3,
            ActivityKind::ContentPublished => 10,
            ActivityKind::MediaUploaded => 5,
            ActivityKind::CommentPosted => 1,
            ActivityKind::MessageSent => 0,
        }
    }

    /// Suffix of the `KINDRED_POINTS_*` override variable.
    pub const fn env_suffix(self) -> &'static str {
        match self {
            ActivityKind::PersonAdded => "PERSON_ADDED",
            ActivityKind::PersonUpdated => "PERSON_UPDATED",
            ActivityKind::RelationshipAdded => "RELATIONSHIP_ADDED",
            ActivityKind::ContributionSubmitted => "CONTRIBUTION_SUBMITTED",
            ActivityKind::ContributionApproved => "CONTRIBUTION_APPROVED",
            ActivityKind::ContributionReviewed => "CONTRIBUTION_REVIEWED",
            ActivityKind::ContentPublished => "CONTENT_PUBLISHED",
            ActivityKind::MediaUploaded => "MEDIA_UPLOADED",
            ActivityKind::CommentPosted => "COMMENT_POSTED",
            ActivityKind::MessageSent => "MESSAGE_SENT",
        }
    }
}

/// What an activity entry refers to, so the feed can link back to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ActivitySubject {
    Person(String),
    Household(String),
    Relationship(String),
    Contribution(String),
    Content(String),
    Comment(String),
    Message(String),
}

/// Audit and gamification log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFeedItem {
    pub id: ActivityId,
    pub user: UserId,
    pub kind: ActivityKind,
    pub points: u32,
    pub subject: ActivitySubject,
    pub summary: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user: UserId,
    pub points: u64,
    pub actions: usize,
}
