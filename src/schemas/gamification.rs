use serde::{Deserialize, Serialize};

use crate::db::models::StudentProfile;
use crate::services::rewards::SpinReward;

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LeaderboardScope {
    #[default]
    Class,
    Global,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LeaderboardQuery {
    #[serde(default)]
    pub(crate) scope: LeaderboardScope,
    #[serde(default)]
    pub(crate) limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LeaderboardEntry {
    pub(crate) student_id: String,
    pub(crate) name: String,
    pub(crate) xp: i64,
    pub(crate) level: i32,
}

impl From<StudentProfile> for LeaderboardEntry {
    fn from(profile: StudentProfile) -> Self {
        Self {
            student_id: profile.id,
            name: profile.full_name,
            xp: profile.xp,
            level: profile.level,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LeaderboardResponse {
    pub(crate) top: Vec<LeaderboardEntry>,
    pub(crate) requester_rank: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SpinResponse {
    pub(crate) reward: SpinReward,
    pub(crate) xp: i64,
    pub(crate) level: i32,
    pub(crate) streak_freezes: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProfileResponse {
    pub(crate) student_id: String,
    pub(crate) name: String,
    pub(crate) grade: i16,
    pub(crate) xp: i64,
    pub(crate) level: i32,
    pub(crate) streak_freezes: i32,
}

impl From<StudentProfile> for ProfileResponse {
    fn from(profile: StudentProfile) -> Self {
        Self {
            student_id: profile.id,
            name: profile.full_name,
            grade: profile.grade,
            xp: profile.xp,
            level: profile.level,
            streak_freezes: profile.streak_freezes,
        }
    }
}
