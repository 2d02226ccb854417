use crate::db::models::MistakeLog;

pub(crate) async fn insert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    mistake: &MistakeLog,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO mistake_logs (id, student_id, question_id, topic_id, mistake_type, created_at)
         VALUES ($1,$2,$3,$4,$5,$6)",
    )
    .bind(&mistake.id)
    .bind(&mistake.student_id)
    .bind(&mistake.question_id)
    .bind(&mistake.topic_id)
    .bind(mistake.mistake_type)
    .bind(mistake.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
