use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::ActivityKind;

/// Point values awarded per activity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    points: BTreeMap<ActivityKind, u32>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let points = ActivityKind::ALL
            .into_iter()
            .map(|kind| (kind, kind.default_points()))
            .collect();
        Self { points }
    }
}

impl ScoringConfig {
    pub fn points_for(&self, kind: ActivityKind) -> u32 {
        self.points
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_points())
    }

    pub fn set_points(&mut self, kind: ActivityKind, points: u32) {
        self.points.insert(kind, points);
    }

    pub fn with_points(mut self, kind: ActivityKind, points: u32) -> Self {
        self.set_points(kind, points);
        self
    }
}
