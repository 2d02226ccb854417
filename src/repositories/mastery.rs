use sqlx::PgPool;

use crate::db::models::MasteryRecord;

pub(crate) const COLUMNS: &str =
    "student_id, topic_id, score, tier, revision_count, last_reviewed_at";

pub(crate) async fn lock(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    student_id: &str,
    topic_id: &str,
) -> Result<Option<MasteryRecord>, sqlx::Error> {
    sqlx::query_as::<_, MasteryRecord>(&format!(
        "SELECT {COLUMNS} FROM mastery_records
         WHERE student_id = $1 AND topic_id = $2
         FOR UPDATE"
    ))
    .bind(student_id)
    .bind(topic_id)
    .fetch_optional(&mut **tx)
    .await
}

/// Returns `false` when a concurrent writer created the row first.
pub(crate) async fn insert_if_absent(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    record: &MasteryRecord,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO mastery_records (
            student_id, topic_id, score, tier, revision_count, last_reviewed_at
         ) VALUES ($1,$2,$3,$4,$5,$6)
         ON CONFLICT (student_id, topic_id) DO NOTHING",
    )
    .bind(&record.student_id)
    .bind(&record.topic_id)
    .bind(record.score)
    .bind(record.tier)
    .bind(record.revision_count)
    .bind(record.last_reviewed_at)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn update(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    record: &MasteryRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE mastery_records
         SET score = $1, tier = $2, revision_count = $3, last_reviewed_at = $4
         WHERE student_id = $5 AND topic_id = $6",
    )
    .bind(record.score)
    .bind(record.tier)
    .bind(record.revision_count)
    .bind(record.last_reviewed_at)
    .bind(&record.student_id)
    .bind(&record.topic_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) async fn list_by_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<MasteryRecord>, sqlx::Error> {
    sqlx::query_as::<_, MasteryRecord>(&format!(
        "SELECT {COLUMNS} FROM mastery_records
         WHERE student_id = $1
         ORDER BY last_reviewed_at DESC, topic_id"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}
