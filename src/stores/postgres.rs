use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use super::{
    AnswerEffect, ChapterCommit, ContentStore, JobStore, MasteryStore, MasteryUpdate, RewardGrant,
    RewardStore, StoreError,
};
use crate::db::models::{IngestionJob, MasteryRecord, Question, StudentProfile, Topic};
use crate::db::types::JobStatus;
use crate::repositories;

#[derive(Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create_job(&self, job: &IngestionJob) -> Result<(), StoreError> {
        repositories::ingestion_jobs::insert(&self.pool, job).await?;
        Ok(())
    }

    async fn find_job(&self, job_id: &str) -> Result<Option<IngestionJob>, StoreError> {
        Ok(repositories::ingestion_jobs::find_by_id(&self.pool, job_id).await?)
    }

    async fn list_jobs_for_owner(&self, owner_id: &str) -> Result<Vec<IngestionJob>, StoreError> {
        Ok(repositories::ingestion_jobs::list_by_owner(&self.pool, owner_id).await?)
    }

    async fn commit_chapter(&self, commit: &ChapterCommit) -> Result<IngestionJob, StoreError> {
        let mut tx = self.pool.begin().await?;

        match repositories::ingestion_jobs::lock_status(&mut tx, &commit.job_id).await? {
            Some(JobStatus::Processing) => {}
            Some(status) => {
                let _ = tx.rollback().await;
                return Err(StoreError::InvalidState(format!(
                    "job {} is {}, expected processing",
                    commit.job_id,
                    status.as_str()
                )));
            }
            None => {
                let _ = tx.rollback().await;
                return Err(StoreError::NotFound("ingestion job"));
            }
        }

        for topic in &commit.topics {
            repositories::topics::insert(&mut tx, topic).await?;
        }
        for question in &commit.questions {
            repositories::questions::insert(&mut tx, question).await?;
        }

        let job = repositories::ingestion_jobs::mark_completed(
            &mut tx,
            &commit.job_id,
            count_i32(commit.topics.len()),
            count_i32(commit.questions.len()),
            commit.processed_at,
        )
        .await?;

        tx.commit().await?;
        Ok(job)
    }

    async fn fail_job(
        &self,
        job_id: &str,
        message: &str,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        Ok(repositories::ingestion_jobs::mark_failed(&self.pool, job_id, message, now).await?)
    }

    async fn publish_job(
        &self,
        job_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<IngestionJob, StoreError> {
        if let Some(job) =
            repositories::ingestion_jobs::mark_published(&self.pool, job_id, now).await?
        {
            return Ok(job);
        }
        match repositories::ingestion_jobs::find_by_id(&self.pool, job_id).await? {
            Some(job) => Err(StoreError::InvalidState(format!(
                "job {job_id} is {}, only completed jobs can be published",
                job.status.as_str()
            ))),
            None => Err(StoreError::NotFound("ingestion job")),
        }
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), StoreError> {
        if repositories::ingestion_jobs::delete_terminal(&self.pool, job_id).await? {
            return Ok(());
        }
        match repositories::ingestion_jobs::find_by_id(&self.pool, job_id).await? {
            Some(_) => Err(StoreError::InvalidState(format!("job {job_id} is still processing"))),
            None => Err(StoreError::NotFound("ingestion job")),
        }
    }

    async fn list_stale_jobs(
        &self,
        created_before: PrimitiveDateTime,
    ) -> Result<Vec<String>, StoreError> {
        Ok(repositories::ingestion_jobs::list_stale_processing(&self.pool, created_before).await?)
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn job_content(&self, job_id: &str) -> Result<Vec<(Topic, Vec<Question>)>, StoreError> {
        let topics = repositories::topics::list_by_job(&self.pool, job_id).await?;
        let topic_ids: Vec<String> = topics.iter().map(|topic| topic.id.clone()).collect();
        let mut questions = repositories::questions::list_by_topics(&self.pool, &topic_ids).await?;

        Ok(topics
            .into_iter()
            .map(|topic| {
                let (own, rest): (Vec<_>, Vec<_>) =
                    questions.drain(..).partition(|question| question.topic_id == topic.id);
                questions = rest;
                (topic, own)
            })
            .collect())
    }

    async fn list_published_topics(
        &self,
        grade: i16,
        subject: Option<&str>,
    ) -> Result<Vec<Topic>, StoreError> {
        Ok(repositories::topics::list_published(&self.pool, grade, subject).await?)
    }

    async fn list_questions(
        &self,
        topic_id: &str,
        limit: i64,
    ) -> Result<Vec<Question>, StoreError> {
        Ok(repositories::questions::list_by_topic(&self.pool, topic_id, limit).await?)
    }

    async fn find_question(&self, question_id: &str) -> Result<Option<Question>, StoreError> {
        Ok(repositories::questions::find_by_id(&self.pool, question_id).await?)
    }
}

#[async_trait]
impl MasteryStore for PgStore {
    async fn record_answer(
        &self,
        student_id: &str,
        topic_id: &str,
        update: &MasteryUpdate<'_>,
        effect: &AnswerEffect,
        level_for: fn(i64) -> i32,
    ) -> Result<MasteryRecord, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Profile first, then the record: the same order `apply_reward` locks in.
        let Some(xp) = repositories::students::lock_xp(&mut tx, student_id).await? else {
            let _ = tx.rollback().await;
            return Err(StoreError::NotFound("student"));
        };

        let existing = repositories::mastery::lock(&mut tx, student_id, topic_id).await?;
        let record = match existing {
            Some(current) => {
                let next = update(Some(&current));
                repositories::mastery::update(&mut tx, &next).await?;
                next
            }
            None => {
                let created = update(None);
                if repositories::mastery::insert_if_absent(&mut tx, &created).await? {
                    created
                } else {
                    // A concurrent first answer won the insert; apply on top of it.
                    let current = repositories::mastery::lock(&mut tx, student_id, topic_id)
                        .await?
                        .ok_or(StoreError::Conflict)?;
                    let next = update(Some(&current));
                    repositories::mastery::update(&mut tx, &next).await?;
                    next
                }
            }
        };

        match effect {
            AnswerEffect::Mistake(mistake) => {
                repositories::mistakes::insert(&mut tx, mistake).await?;
            }
            AnswerEffect::Reward(grant) => {
                apply_grant(&mut tx, xp, grant, level_for).await?;
            }
        }

        tx.commit().await?;
        Ok(record)
    }

    async fn list_mastery(&self, student_id: &str) -> Result<Vec<MasteryRecord>, StoreError> {
        Ok(repositories::mastery::list_by_student(&self.pool, student_id).await?)
    }
}

#[async_trait]
impl RewardStore for PgStore {
    async fn find_student(&self, student_id: &str) -> Result<Option<StudentProfile>, StoreError> {
        Ok(repositories::students::find_by_id(&self.pool, student_id).await?)
    }

    async fn apply_reward(
        &self,
        grant: &RewardGrant,
        level_for: fn(i64) -> i32,
    ) -> Result<StudentProfile, StoreError> {
        let mut tx = self.pool.begin().await?;

        let Some(xp) = repositories::students::lock_xp(&mut tx, &grant.event.student_id).await?
        else {
            let _ = tx.rollback().await;
            return Err(StoreError::NotFound("student"));
        };

        let profile = apply_grant(&mut tx, xp, grant, level_for).await?;
        tx.commit().await?;
        Ok(profile)
    }

    async fn leaderboard(
        &self,
        grade: Option<i16>,
        limit: i64,
    ) -> Result<Vec<StudentProfile>, StoreError> {
        Ok(repositories::students::list_top(&self.pool, grade, limit).await?)
    }

    async fn count_ahead(&self, grade: Option<i16>, xp: i64) -> Result<i64, StoreError> {
        Ok(repositories::students::count_with_more_xp(&self.pool, grade, xp).await?)
    }
}

/// Appends the ledger row and moves the locked profile from `current_xp`.
async fn apply_grant(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    current_xp: i64,
    grant: &RewardGrant,
    level_for: fn(i64) -> i32,
) -> Result<StudentProfile, sqlx::Error> {
    let total = current_xp.saturating_add(grant.event.xp_delta);
    repositories::rewards::insert(tx, &grant.event).await?;
    repositories::students::apply_progress(
        tx,
        &grant.event.student_id,
        total,
        level_for(total),
        grant.streak_freezes,
    )
    .await
}

fn count_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
