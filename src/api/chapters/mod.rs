mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::submit_chapter).get(handlers::list_chapters))
        .route("/upload-url", post(handlers::create_upload_url))
        .route("/:job_id", get(handlers::get_chapter).delete(handlers::delete_chapter))
        .route("/:job_id/content", get(handlers::get_chapter_content))
        .route("/:job_id/publish", post(handlers::publish_chapter))
}

#[cfg(test)]
mod tests;
