use sqlx::PgPool;

use crate::db::models::Question;

pub(crate) const COLUMNS: &str = "\
    id, topic_id, content, question_type, options, correct_answer, explanation, difficulty, \
    created_at";

pub(crate) async fn insert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    question: &Question,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO questions (
            id, topic_id, content, question_type, options, correct_answer, explanation,
            difficulty, created_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)",
    )
    .bind(&question.id)
    .bind(&question.topic_id)
    .bind(&question.content)
    .bind(question.question_type)
    .bind(&question.options)
    .bind(&question.correct_answer)
    .bind(&question.explanation)
    .bind(question.difficulty)
    .bind(question.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_by_topic(
    pool: &PgPool,
    topic_id: &str,
    limit: i64,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions
         WHERE topic_id = $1
         ORDER BY difficulty, created_at, id
         LIMIT $2"
    ))
    .bind(topic_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_topics(
    pool: &PgPool,
    topic_ids: &[String],
) -> Result<Vec<Question>, sqlx::Error> {
    if topic_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions
         WHERE topic_id = ANY($1)
         ORDER BY difficulty, created_at, id"
    ))
    .bind(topic_ids)
    .fetch_all(pool)
    .await
}
