use axum::extract::{Query, State};
use axum::Json;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::api::validation::clamp_limit;
use crate::core::redis::RateLimit;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::schemas::gamification::{
    LeaderboardEntry, LeaderboardQuery, LeaderboardResponse, LeaderboardScope, ProfileResponse,
    SpinResponse,
};
use crate::services::rewards::RankScope;

const MAX_LEADERBOARD_SIZE: i64 = 100;

pub(super) async fn leaderboard(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let default_size = state.settings().gamification().leaderboard_size;
    let limit = clamp_limit(query.limit, default_size, MAX_LEADERBOARD_SIZE);
    let scope = match query.scope {
        LeaderboardScope::Class => RankScope::Class,
        LeaderboardScope::Global => RankScope::Global,
    };

    let board = state.services().rewards.leaderboard(&student.id, scope, limit).await?;
    Ok(Json(LeaderboardResponse {
        top: board.top.into_iter().map(LeaderboardEntry::from).collect(),
        requester_rank: board.requester_rank,
    }))
}

pub(super) async fn spin(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<SpinResponse>, ApiError> {
    let limit = RateLimit::daily_spin(
        &student.id,
        state.settings().gamification().spins_per_day,
        primitive_now_utc(),
    );
    if !state.redis().allow(&limit).await {
        return Err(ApiError::TooManyRequests("Daily spin limit reached"));
    }

    let outcome = match state.services().rewards.spin(&student.id).await {
        Ok(outcome) => outcome,
        Err(err) => {
            state.redis().refund(&limit).await;
            return Err(err.into());
        }
    };
    Ok(Json(SpinResponse {
        reward: outcome.reward,
        xp: outcome.profile.xp,
        level: outcome.profile.level,
        streak_freezes: outcome.profile.streak_freezes,
    }))
}

pub(super) async fn profile(CurrentStudent(student): CurrentStudent) -> Json<ProfileResponse> {
    Json(ProfileResponse::from(student))
}
