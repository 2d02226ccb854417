use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{ensure_job_owner, CurrentTeacher};
use crate::api::validation::validate_document_upload;
use crate::core::redis::RateLimit;
use crate::core::security::Claims;
use crate::core::state::AppState;
use crate::db::models::IngestionJob;
use crate::schemas::chapter::{
    ChapterContentResponse, ChapterJobResponse, ChapterSubmitRequest, ChapterSubmitResponse,
    TopicWithQuestionsResponse, UploadUrlRequest, UploadUrlResponse,
};
use crate::services::ingestion::{NewChapterJob, SubmitError};

pub(super) async fn submit_chapter(
    CurrentTeacher(claims): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<ChapterSubmitRequest>,
) -> Result<(StatusCode, Json<ChapterSubmitResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let per_hour = state.settings().ingestion().submissions_per_hour;
    let limit = RateLimit::chapter_submissions(&claims.sub, per_hour);
    if !state.redis().allow(&limit).await {
        return Err(ApiError::TooManyRequests("Too many chapter uploads, try again later"));
    }

    let submitted = state
        .services()
        .ingestion
        .submit(NewChapterJob {
            owner_id: claims.sub,
            subject: payload.subject,
            grade: payload.grade,
            name: payload.name,
            document_ref: payload.document_ref,
        })
        .await
        .map_err(|err| match err {
            SubmitError::Validation(message) => ApiError::BadRequest(message),
            SubmitError::Store(err) => ApiError::from(err),
        })?;

    // The run is detached; its outcome is only observable through job status.
    drop(submitted.handle);

    Ok((
        StatusCode::ACCEPTED,
        Json(ChapterSubmitResponse { job_id: submitted.job.id, status: submitted.job.status }),
    ))
}

pub(super) async fn create_upload_url(
    CurrentTeacher(claims): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<UploadUrlRequest>,
) -> Result<Json<UploadUrlResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let extension = validate_document_upload(
        &payload.filename,
        &state.settings().ingestion().allowed_document_extensions,
    )?;

    let storage = state
        .storage()
        .ok_or_else(|| ApiError::ServiceUnavailable("Document storage is not configured".into()))?;

    let expires_in_seconds = state.settings().ingestion().presigned_url_expire_minutes * 60;
    let upload = storage
        .presign_upload(
            &claims.sub,
            &extension,
            &payload.content_type,
            Duration::from_secs(expires_in_seconds),
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create upload URL"))?;

    Ok(Json(UploadUrlResponse {
        upload_url: upload.url,
        document_ref: upload.document_ref,
        expires_in_seconds,
    }))
}

pub(super) async fn list_chapters(
    CurrentTeacher(claims): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Vec<ChapterJobResponse>>, ApiError> {
    let jobs = state.services().ingestion.list_for_owner(&claims.sub).await?;
    Ok(Json(jobs.into_iter().map(ChapterJobResponse::from).collect()))
}

pub(super) async fn get_chapter(
    CurrentTeacher(claims): CurrentTeacher,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ChapterJobResponse>, ApiError> {
    let job = load_owned_job(&state, &claims, &job_id).await?;
    Ok(Json(job.into()))
}

pub(super) async fn get_chapter_content(
    CurrentTeacher(claims): CurrentTeacher,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ChapterContentResponse>, ApiError> {
    let job = load_owned_job(&state, &claims, &job_id).await?;
    let content = state.services().content.job_content(&job.id).await?;

    let topics = content
        .into_iter()
        .map(|(topic, questions)| TopicWithQuestionsResponse {
            topic: topic.into(),
            questions: questions.into_iter().map(Into::into).collect(),
        })
        .collect();

    Ok(Json(ChapterContentResponse { job: job.into(), topics }))
}

pub(super) async fn publish_chapter(
    CurrentTeacher(claims): CurrentTeacher,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ChapterJobResponse>, ApiError> {
    load_owned_job(&state, &claims, &job_id).await?;
    let job = state.services().ingestion.publish(&job_id).await?;
    Ok(Json(job.into()))
}

pub(super) async fn delete_chapter(
    CurrentTeacher(claims): CurrentTeacher,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    load_owned_job(&state, &claims, &job_id).await?;
    state.services().ingestion.delete(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn load_owned_job(
    state: &AppState,
    claims: &Claims,
    job_id: &str,
) -> Result<IngestionJob, ApiError> {
    let job = state
        .services()
        .ingestion
        .get_status(job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Chapter not found".to_string()))?;
    ensure_job_owner(claims, &job.owner_id)?;
    Ok(job)
}
