use crate::db::models::RewardEvent;

pub(crate) async fn insert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &RewardEvent,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO reward_events (id, student_id, xp_delta, source, badge, created_at)
         VALUES ($1,$2,$3,$4,$5,$6)",
    )
    .bind(&event.id)
    .bind(&event.student_id)
    .bind(event.xp_delta)
    .bind(event.source)
    .bind(&event.badge)
    .bind(event.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
