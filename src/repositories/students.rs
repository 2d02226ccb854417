use sqlx::PgPool;

use crate::db::models::StudentProfile;

pub(crate) const COLUMNS: &str =
    "id, user_id, full_name, grade, xp, level, streak_freezes, created_at";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<StudentProfile>, sqlx::Error> {
    sqlx::query_as::<_, StudentProfile>(&format!(
        "SELECT {COLUMNS} FROM student_profiles WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn lock_xp(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: &str,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT xp FROM student_profiles WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
}

pub(crate) async fn apply_progress(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: &str,
    xp: i64,
    level: i32,
    streak_freezes_delta: i32,
) -> Result<StudentProfile, sqlx::Error> {
    sqlx::query_as::<_, StudentProfile>(&format!(
        "UPDATE student_profiles
         SET xp = $1, level = $2, streak_freezes = streak_freezes + $3
         WHERE id = $4
         RETURNING {COLUMNS}"
    ))
    .bind(xp)
    .bind(level)
    .bind(streak_freezes_delta)
    .bind(id)
    .fetch_one(&mut **tx)
    .await
}

pub(crate) async fn list_top(
    pool: &PgPool,
    grade: Option<i16>,
    limit: i64,
) -> Result<Vec<StudentProfile>, sqlx::Error> {
    sqlx::query_as::<_, StudentProfile>(&format!(
        "SELECT {COLUMNS} FROM student_profiles
         WHERE ($1::smallint IS NULL OR grade = $1)
         ORDER BY xp DESC, created_at, id
         LIMIT $2"
    ))
    .bind(grade)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_with_more_xp(
    pool: &PgPool,
    grade: Option<i16>,
    xp: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM student_profiles
         WHERE ($1::smallint IS NULL OR grade = $1) AND xp > $2",
    )
    .bind(grade)
    .bind(xp)
    .fetch_one(pool)
    .await
}
