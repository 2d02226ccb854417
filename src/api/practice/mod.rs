mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/topics", get(handlers::list_topics))
        .route("/topics/:topic_id/questions", get(handlers::list_questions))
        .route("/answers", post(handlers::submit_answer))
        .route("/mastery", get(handlers::list_mastery))
}
