//! Persistence seams for the ingestion pipeline and the progression engine.
//!
//! Services depend on these traits rather than on a pool so the state
//! machines can be driven against Postgres in production and against the
//! in-memory store in tests.

#[cfg(test)]
pub(crate) mod memory;
pub(crate) mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{
    IngestionJob, MasteryRecord, MistakeLog, Question, RewardEvent, StudentProfile, Topic,
};

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("concurrent update conflict")]
    Conflict,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid state transition: {0}")]
    InvalidState(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let conflict = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == "40001" || code == "40P01");
        if conflict {
            Self::Conflict
        } else {
            Self::Database(err)
        }
    }
}

/// Rows produced by one successful generation run, written atomically
/// together with the job's transition to `completed`.
#[derive(Debug, Clone)]
pub(crate) struct ChapterCommit {
    pub(crate) job_id: String,
    pub(crate) topics: Vec<Topic>,
    pub(crate) questions: Vec<Question>,
    pub(crate) processed_at: PrimitiveDateTime,
}

/// Ledger entry plus its side effects on the student profile.
#[derive(Debug, Clone)]
pub(crate) struct RewardGrant {
    pub(crate) event: RewardEvent,
    pub(crate) streak_freezes: i32,
}

pub(crate) type MasteryUpdate<'a> =
    dyn Fn(Option<&MasteryRecord>) -> MasteryRecord + Send + Sync + 'a;

/// Written in the same transaction as the mastery record it accompanies.
#[derive(Debug, Clone)]
pub(crate) enum AnswerEffect {
    Mistake(MistakeLog),
    Reward(RewardGrant),
}

#[async_trait]
pub(crate) trait JobStore: Send + Sync {
    async fn create_job(&self, job: &IngestionJob) -> Result<(), StoreError>;

    async fn find_job(&self, job_id: &str) -> Result<Option<IngestionJob>, StoreError>;

    async fn list_jobs_for_owner(&self, owner_id: &str) -> Result<Vec<IngestionJob>, StoreError>;

    /// Inserts every topic and question and flips the job to `completed`
    /// in one transaction. Fails with `InvalidState` unless the job is
    /// still `processing`.
    async fn commit_chapter(&self, commit: &ChapterCommit) -> Result<IngestionJob, StoreError>;

    /// Moves a `processing` job to `failed`. Returns `false` when the job
    /// had already left `processing`.
    async fn fail_job(
        &self,
        job_id: &str,
        message: &str,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError>;

    async fn publish_job(
        &self,
        job_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<IngestionJob, StoreError>;

    /// Deletes a terminal job with its topics and questions.
    async fn delete_job(&self, job_id: &str) -> Result<(), StoreError>;

    async fn list_stale_jobs(
        &self,
        created_before: PrimitiveDateTime,
    ) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub(crate) trait ContentStore: Send + Sync {
    async fn job_content(&self, job_id: &str) -> Result<Vec<(Topic, Vec<Question>)>, StoreError>;

    async fn list_published_topics(
        &self,
        grade: i16,
        subject: Option<&str>,
    ) -> Result<Vec<Topic>, StoreError>;

    async fn list_questions(&self, topic_id: &str, limit: i64)
        -> Result<Vec<Question>, StoreError>;

    async fn find_question(&self, question_id: &str) -> Result<Option<Question>, StoreError>;
}

#[async_trait]
pub(crate) trait MasteryStore: Send + Sync {
    /// Read-modify-write of one (student, topic) record plus its `effect`,
    /// under row locks on the profile and the record. Nothing is written
    /// unless all of it is; a missing profile is `NotFound("student")`.
    async fn record_answer(
        &self,
        student_id: &str,
        topic_id: &str,
        update: &MasteryUpdate<'_>,
        effect: &AnswerEffect,
        level_for: fn(i64) -> i32,
    ) -> Result<MasteryRecord, StoreError>;

    async fn list_mastery(&self, student_id: &str) -> Result<Vec<MasteryRecord>, StoreError>;
}

#[async_trait]
pub(crate) trait RewardStore: Send + Sync {
    async fn find_student(&self, student_id: &str) -> Result<Option<StudentProfile>, StoreError>;

    /// Appends the ledger row and applies xp, level and streak freezes
    /// atomically. `level_for` maps the new xp total to a level.
    async fn apply_reward(
        &self,
        grant: &RewardGrant,
        level_for: fn(i64) -> i32,
    ) -> Result<StudentProfile, StoreError>;

    /// Ordered by xp descending, then `created_at` and `id` ascending.
    async fn leaderboard(
        &self,
        grade: Option<i16>,
        limit: i64,
    ) -> Result<Vec<StudentProfile>, StoreError>;

    async fn count_ahead(&self, grade: Option<i16>, xp: i64) -> Result<i64, StoreError>;
}
