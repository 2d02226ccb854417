//! Experience, levels, the daily spin wheel and leaderboard ranking.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::{RewardEvent, StudentProfile};
use crate::db::types::RewardSource;
use crate::stores::{RewardGrant, RewardStore, StoreError};

/// Minimum xp for each level, level 1 first.
pub(crate) const LEVEL_THRESHOLDS: [i64; 10] =
    [0, 100, 250, 500, 1000, 2000, 3500, 5500, 8000, 11000];

pub(crate) const LUCKY_SPINNER_BADGE: &str = "Lucky Spinner";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum SpinReward {
    Xp { amount: i64 },
    Badge { label: &'static str },
    StreakFreeze { count: i32 },
}

impl SpinReward {
    pub(crate) fn metric_label(self) -> &'static str {
        match self {
            Self::Xp { .. } => "xp",
            Self::Badge { .. } => "badge",
            Self::StreakFreeze { .. } => "streak_freeze",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SpinSlot {
    pub(crate) reward: SpinReward,
    pub(crate) weight: f64,
}

pub(crate) const SPIN_TABLE: [SpinSlot; 5] = [
    SpinSlot { reward: SpinReward::Xp { amount: 50 }, weight: 0.40 },
    SpinSlot { reward: SpinReward::Xp { amount: 100 }, weight: 0.30 },
    SpinSlot { reward: SpinReward::Xp { amount: 200 }, weight: 0.15 },
    SpinSlot { reward: SpinReward::Badge { label: LUCKY_SPINNER_BADGE }, weight: 0.10 },
    SpinSlot { reward: SpinReward::StreakFreeze { count: 1 }, weight: 0.05 },
];

pub(crate) fn level_for_xp(xp: i64) -> i32 {
    LEVEL_THRESHOLDS.iter().filter(|threshold| **threshold <= xp).count().max(1) as i32
}

/// Picks the slot whose cumulative weight first exceeds `roll` in `[0, 1)`.
pub(crate) fn draw_spin(roll: f64) -> SpinReward {
    let mut cumulative = 0.0;
    for slot in &SPIN_TABLE {
        cumulative += slot.weight;
        if roll < cumulative {
            return slot.reward;
        }
    }
    SPIN_TABLE[SPIN_TABLE.len() - 1].reward
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RankScope {
    Global,
    Class,
}

#[derive(Debug, Clone)]
pub(crate) struct Leaderboard {
    pub(crate) top: Vec<StudentProfile>,
    pub(crate) requester_rank: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct SpinOutcome {
    pub(crate) reward: SpinReward,
    pub(crate) profile: StudentProfile,
}

#[derive(Debug, Error)]
pub(crate) enum RewardError {
    #[error("student profile not found")]
    StudentNotFound,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RewardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound("student") => Self::StudentNotFound,
            other => Self::Store(other),
        }
    }
}

#[derive(Clone)]
pub(crate) struct RewardService {
    store: Arc<dyn RewardStore>,
}

impl RewardService {
    pub(crate) fn new(store: Arc<dyn RewardStore>) -> Self {
        Self { store }
    }

    pub(crate) async fn profile(&self, student_id: &str) -> Result<StudentProfile, RewardError> {
        self.store.find_student(student_id).await?.ok_or(RewardError::StudentNotFound)
    }

    pub(crate) async fn spin(&self, student_id: &str) -> Result<SpinOutcome, RewardError> {
        let roll = rand::random::<f64>();
        self.spin_with_roll(student_id, roll).await
    }

    pub(crate) async fn spin_with_roll(
        &self,
        student_id: &str,
        roll: f64,
    ) -> Result<SpinOutcome, RewardError> {
        let reward = draw_spin(roll);
        let grant = match reward {
            SpinReward::Xp { amount } => RewardGrant {
                event: new_event(student_id, amount, RewardSource::SpinWheel, None),
                streak_freezes: 0,
            },
            SpinReward::Badge { label } => RewardGrant {
                event: new_event(student_id, 0, RewardSource::SpinWheel, Some(label)),
                streak_freezes: 0,
            },
            SpinReward::StreakFreeze { count } => RewardGrant {
                event: new_event(student_id, 0, RewardSource::SpinWheel, None),
                streak_freezes: count,
            },
        };

        let profile = self.store.apply_reward(&grant, level_for_xp).await?;
        metrics::counter!("spin_rewards_total", "reward" => reward.metric_label()).increment(1);
        tracing::info!(student_id, reward = reward.metric_label(), "Spin reward granted");
        Ok(SpinOutcome { reward, profile })
    }

    /// Top `limit` students in scope plus the requester's competition rank:
    /// one more than the number of students with strictly more xp.
    pub(crate) async fn leaderboard(
        &self,
        student_id: &str,
        scope: RankScope,
        limit: i64,
    ) -> Result<Leaderboard, RewardError> {
        let requester = self.profile(student_id).await?;
        let grade = match scope {
            RankScope::Global => None,
            RankScope::Class => Some(requester.grade),
        };

        let top = self.store.leaderboard(grade, limit).await?;
        let ahead = self.store.count_ahead(grade, requester.xp).await?;
        Ok(Leaderboard { top, requester_rank: ahead + 1 })
    }
}

/// Ledger entry for `xp`. Applying it also recomputes the level.
pub(crate) fn xp_grant(student_id: &str, xp: i64, source: RewardSource) -> RewardGrant {
    RewardGrant { event: new_event(student_id, xp.max(0), source, None), streak_freezes: 0 }
}

fn new_event(
    student_id: &str,
    xp_delta: i64,
    source: RewardSource,
    badge: Option<&str>,
) -> RewardEvent {
    RewardEvent {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        xp_delta,
        source,
        badge: badge.map(str::to_string),
        created_at: primitive_now_utc(),
    }
}
