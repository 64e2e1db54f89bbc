//! Activity feed: point-awarding log entries written by the other services,
//! plus the read side (recent items, per-user totals, leaderboard).

pub mod domain;
pub mod repository;
pub mod router;
mod scoring;
pub mod service;

pub use domain::{ActivityFeedItem, ActivityId, ActivityKind, ActivitySubject, LeaderboardEntry};
pub use repository::ActivityRepository;
pub use router::activity_router;
pub use scoring::ScoringConfig;
pub use service::{ActivityRecorder, ActivityService};
