use sqlx::PgPool;

use crate::db::models::Topic;
use crate::db::types::TopicStatus;

pub(crate) const COLUMNS: &str = "\
    id, job_id, name, subject, grade, position, theory, eli5, story, examples, status, created_at";

pub(crate) async fn insert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    topic: &Topic,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO topics (
            id, job_id, name, subject, grade, position, theory, eli5, story, examples,
            status, created_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)",
    )
    .bind(&topic.id)
    .bind(&topic.job_id)
    .bind(&topic.name)
    .bind(&topic.subject)
    .bind(topic.grade)
    .bind(topic.position)
    .bind(&topic.theory)
    .bind(&topic.eli5)
    .bind(&topic.story)
    .bind(&topic.examples)
    .bind(topic.status)
    .bind(topic.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) async fn list_by_job(pool: &PgPool, job_id: &str) -> Result<Vec<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>(&format!(
        "SELECT {COLUMNS} FROM topics WHERE job_id = $1 ORDER BY position, id"
    ))
    .bind(job_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_published(
    pool: &PgPool,
    grade: i16,
    subject: Option<&str>,
) -> Result<Vec<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>(&format!(
        "SELECT {COLUMNS} FROM topics
         WHERE status = $1 AND grade = $2 AND ($3::text IS NULL OR subject = $3)
         ORDER BY subject, created_at, position, id"
    ))
    .bind(TopicStatus::Published)
    .bind(grade)
    .bind(subject)
    .fetch_all(pool)
    .await
}
