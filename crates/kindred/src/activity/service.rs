use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use super::domain::{
    ActivityFeedItem, ActivityId, ActivityKind, ActivitySubject, LeaderboardEntry,
};
use super::repository::ActivityRepository;
use super::scoring::ScoringConfig;
use crate::audit::{IdSequence, UserId};
use crate::store::RepositoryError;

static ACTIVITY_SEQUENCE: IdSequence = IdSequence::new("act");

const MAX_FEED_PAGE: usize = 200;

/// Writes feed entries with points resolved from the scoring table.
pub struct ActivityRecorder<A> {
    repository: Arc<A>,
    scoring: ScoringConfig,
}

impl<A> ActivityRecorder<A>
where
    A: ActivityRepository + 'static,
{
    pub fn new(repository: Arc<A>, scoring: ScoringConfig) -> Self {
        Self {
            repository,
            scoring,
        }
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn record(
        &self,
        user: &UserId,
        kind: ActivityKind,
        subject: ActivitySubject,
        summary: impl Into<String>,
    ) -> Result<ActivityFeedItem, RepositoryError> {
        let item = ActivityFeedItem {
            id: ActivityId(ACTIVITY_SEQUENCE.next_id()),
            user: user.clone(),
            kind,
            points: self.scoring.points_for(kind),
            subject,
            summary: summary.into(),
            occurred_at: Utc::now(),
        };
        self.repository.append(item.clone())?;
        Ok(item)
    }

    /// Feed writes never fail the action that triggered them.
    pub fn record_or_warn(
        &self,
        user: &UserId,
        kind: ActivityKind,
        subject: ActivitySubject,
        summary: impl Into<String>,
    ) {
        if let Err(err) = self.record(user, kind, subject, summary) {
            warn!(%user, ?kind, error = %err, "activity feed write failed");
        }
    }
}

/// Read side of the activity feed: recent entries, per-user totals, leaderboard.
pub struct ActivityService<A> {
    repository: Arc<A>,
}

impl<A> ActivityService<A>
where
    A: ActivityRepository + 'static,
{
    pub fn new(repository: Arc<A>) -> Self {
        Self { repository }
    }

    /// Newest entries first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ActivityFeedItem>, RepositoryError> {
        let mut items = self.repository.items()?;
        items.reverse();
        items.truncate(limit.min(MAX_FEED_PAGE));
        Ok(items)
    }

    pub fn for_user(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ActivityFeedItem>, RepositoryError> {
        let mut items: Vec<_> = self
            .repository
            .items()?
            .into_iter()
            .filter(|item| &item.user == user)
            .collect();
        items.reverse();
        items.truncate(limit.min(MAX_FEED_PAGE));
        Ok(items)
    }

    pub fn points_for(&self, user: &UserId) -> Result<u64, RepositoryError> {
        Ok(self
            .repository
            .items()?
            .iter()
            .filter(|item| &item.user == user)
            .map(|item| u64::from(item.points))
            .sum())
    }

    /// Users ranked by total points, ties broken by user id.
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, RepositoryError> {
        let mut totals: BTreeMap<UserId, (u64, usize)> = BTreeMap::new();
        for item in self.repository.items()? {
            let entry = totals.entry(item.user).or_default();
            entry.0 += u64::from(item.points);
            entry.1 += 1;
        }

        let mut ranked: Vec<_> = totals.into_iter().collect();
        ranked.sort_by(|(user_a, (points_a, _)), (user_b, (points_b, _))| {
            points_b.cmp(points_a).then_with(|| user_a.cmp(user_b))
        });

        Ok(ranked
            .into_iter()
            .take(limit.min(MAX_FEED_PAGE))
            .enumerate()
            .map(|(index, (user, (points, actions)))| LeaderboardEntry {
                rank: index + 1,
                user,
                points,
                actions,
            })
            .collect())
    }
}
