mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/leaderboard", get(handlers::leaderboard))
        .route("/spin", post(handlers::spin))
        .route("/profile", get(handlers::profile))
}
