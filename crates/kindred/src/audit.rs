//! Audit stamps, soft deletion, caller identity, and identifier sequences
//! shared by every stored aggregate.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header carrying the caller identity. Authentication happens upstream.
pub const USER_HEADER: &str = "x-kindred-user";

/// Identity of the user performing an action.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the caller from request headers; blank values are treated as missing.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Self(value.to_string()))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creation, modification, and soft-deletion metadata stamped on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub updated_at: DateTime<Utc>,
    pub updated_by: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<UserId>,
}

impl AuditStamp {
    pub fn created(actor: &UserId, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            created_by: actor.clone(),
            updated_at: now,
            updated_by: actor.clone(),
            deleted_at: None,
            deleted_by: None,
        }
    }

    pub fn touch(&mut self, actor: &UserId, now: DateTime<Utc>) {
        self.updated_at = now;
        self.updated_by = actor.clone();
    }

    pub fn soft_delete(&mut self, actor: &UserId, now: DateTime<Utc>) {
        self.touch(actor, now);
        self.deleted_at = Some(now);
        self.deleted_by = Some(actor.clone());
    }

    pub fn restore(&mut self, actor: &UserId, now: DateTime<Utc>) {
        self.touch(actor, now);
        self.deleted_at = None;
        self.deleted_by = None;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Implemented by aggregates carrying an [`AuditStamp`] so stores can filter
/// soft-deleted rows uniformly.
pub trait Audited {
    fn audit(&self) -> &AuditStamp;

    fn is_live(&self) -> bool {
        !self.audit().is_deleted()
    }
}

/// Monotonic identifier source producing `prefix-000042` style ids.
pub struct IdSequence {
    prefix: &'static str,
    next: AtomicU64,
}

impl IdSequence {
    pub const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> String {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{id:06}", self.prefix)
    }
}
