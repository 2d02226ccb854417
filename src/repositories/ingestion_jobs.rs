use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::IngestionJob;
use crate::db::types::JobStatus;

pub(crate) const COLUMNS: &str = "\
    id, owner_id, subject, grade, name, document_ref, status, topic_count, question_count, \
    error_message, created_at, processed_at, published_at";

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    job: &IngestionJob,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO ingestion_jobs (
            id, owner_id, subject, grade, name, document_ref, status, topic_count,
            question_count, error_message, created_at, processed_at, published_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)",
    )
    .bind(&job.id)
    .bind(&job.owner_id)
    .bind(&job.subject)
    .bind(job.grade)
    .bind(&job.name)
    .bind(&job.document_ref)
    .bind(job.status)
    .bind(job.topic_count)
    .bind(job.question_count)
    .bind(&job.error_message)
    .bind(job.created_at)
    .bind(job.processed_at)
    .bind(job.published_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<IngestionJob>, sqlx::Error> {
    let sql = format!("SELECT {COLUMNS} FROM ingestion_jobs WHERE id = $1");
    sqlx::query_as::<_, IngestionJob>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn lock_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: &str,
) -> Result<Option<JobStatus>, sqlx::Error> {
    sqlx::query_scalar::<_, JobStatus>(
        "SELECT status FROM ingestion_jobs WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

pub(crate) async fn list_by_owner(
    pool: &PgPool,
    owner_id: &str,
) -> Result<Vec<IngestionJob>, sqlx::Error> {
    sqlx::query_as::<_, IngestionJob>(&format!(
        "SELECT {COLUMNS} FROM ingestion_jobs WHERE owner_id = $1 ORDER BY created_at DESC, id"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn mark_completed(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: &str,
    topic_count: i32,
    question_count: i32,
    processed_at: PrimitiveDateTime,
) -> Result<IngestionJob, sqlx::Error> {
    sqlx::query_as::<_, IngestionJob>(&format!(
        "UPDATE ingestion_jobs
         SET status = $1, topic_count = $2, question_count = $3, error_message = NULL,
             processed_at = $4
         WHERE id = $5
         RETURNING {COLUMNS}"
    ))
    .bind(JobStatus::Completed)
    .bind(topic_count)
    .bind(question_count)
    .bind(processed_at)
    .bind(id)
    .fetch_one(&mut **tx)
    .await
}

/// Only a `processing` job can fail; returns whether a row moved.
pub(crate) async fn mark_failed(
    pool: &PgPool,
    id: &str,
    message: &str,
    processed_at: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE ingestion_jobs
         SET status = $1, error_message = $2, processed_at = $3
         WHERE id = $4 AND status = $5",
    )
    .bind(JobStatus::Failed)
    .bind(message)
    .bind(processed_at)
    .bind(id)
    .bind(JobStatus::Processing)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn mark_published(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<Option<IngestionJob>, sqlx::Error> {
    sqlx::query_as::<_, IngestionJob>(&format!(
        "UPDATE ingestion_jobs
         SET status = $1, published_at = $2
         WHERE id = $3 AND status = $4
         RETURNING {COLUMNS}"
    ))
    .bind(JobStatus::Published)
    .bind(now)
    .bind(id)
    .bind(JobStatus::Completed)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete_terminal(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM ingestion_jobs WHERE id = $1 AND status <> $2")
        .bind(id)
        .bind(JobStatus::Processing)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_stale_processing(
    pool: &PgPool,
    created_before: PrimitiveDateTime,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT id FROM ingestion_jobs
         WHERE status = $1 AND created_at < $2
         ORDER BY created_at
         LIMIT 100",
    )
    .bind(JobStatus::Processing)
    .bind(created_before)
    .fetch_all(pool)
    .await
}
