use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::PrimitiveDateTime;
use tokio::sync::Mutex;

use super::{
    AnswerEffect, ChapterCommit, ContentStore, JobStore, MasteryStore, MasteryUpdate, RewardGrant,
    RewardStore, StoreError,
};
use crate::db::models::{
    IngestionJob, MasteryRecord, MistakeLog, Question, RewardEvent, StudentProfile, Topic,
};
use crate::db::types::{JobStatus, TopicStatus};

#[derive(Default)]
struct Tables {
    jobs: HashMap<String, IngestionJob>,
    topics: Vec<Topic>,
    questions: Vec<Question>,
    mastery: HashMap<(String, String), MasteryRecord>,
    mistakes: Vec<MistakeLog>,
    students: HashMap<String, StudentProfile>,
    rewards: Vec<RewardEvent>,
}

/// Single-lock store mirroring the transactional behaviour of `PgStore`.
#[derive(Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Tables>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes every `commit_chapter` call fail after partially staging rows.
    pub(crate) fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub(crate) async fn insert_student(&self, profile: StudentProfile) {
        self.tables.lock().await.students.insert(profile.id.clone(), profile);
    }

    pub(crate) async fn insert_topic(&self, topic: Topic) {
        self.tables.lock().await.topics.push(topic);
    }

    pub(crate) async fn insert_question(&self, question: Question) {
        self.tables.lock().await.questions.push(question);
    }

    pub(crate) async fn insert_mastery(&self, student_id: &str, topic_id: &str, score: i32) {
        let record = MasteryRecord {
            student_id: student_id.to_string(),
            topic_id: topic_id.to_string(),
            score,
            tier: crate::services::mastery::tier_for_score(score),
            revision_count: 1,
            last_reviewed_at: crate::core::time::primitive_now_utc(),
        };
        self.tables
            .lock()
            .await
            .mastery
            .insert((student_id.to_string(), topic_id.to_string()), record);
    }

    pub(crate) async fn topic_count(&self) -> usize {
        self.tables.lock().await.topics.len()
    }

    pub(crate) async fn question_count(&self) -> usize {
        self.tables.lock().await.questions.len()
    }

    pub(crate) async fn mistakes(&self) -> Vec<MistakeLog> {
        self.tables.lock().await.mistakes.clone()
    }

    pub(crate) async fn reward_events(&self) -> Vec<RewardEvent> {
        self.tables.lock().await.rewards.clone()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, job: &IngestionJob) -> Result<(), StoreError> {
        self.tables.lock().await.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn find_job(&self, job_id: &str) -> Result<Option<IngestionJob>, StoreError> {
        Ok(self.tables.lock().await.jobs.get(job_id).cloned())
    }

    async fn list_jobs_for_owner(&self, owner_id: &str) -> Result<Vec<IngestionJob>, StoreError> {
        let tables = self.tables.lock().await;
        let mut jobs: Vec<IngestionJob> =
            tables.jobs.values().filter(|job| job.owner_id == owner_id).cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn commit_chapter(&self, commit: &ChapterCommit) -> Result<IngestionJob, StoreError> {
        let mut tables = self.tables.lock().await;
        let status = tables
            .jobs
            .get(&commit.job_id)
            .map(|job| job.status)
            .ok_or(StoreError::NotFound("ingestion job"))?;
        if status != JobStatus::Processing {
            return Err(StoreError::InvalidState(format!(
                "job {} is {}, expected processing",
                commit.job_id,
                status.as_str()
            )));
        }

        // Stage into copies so a failure leaves the tables untouched.
        let mut topics = tables.topics.clone();
        let mut questions = tables.questions.clone();
        topics.extend(commit.topics.iter().cloned());
        questions.extend(commit.questions.iter().cloned());
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }

        tables.topics = topics;
        tables.questions = questions;
        let job =
            tables.jobs.get_mut(&commit.job_id).ok_or(StoreError::NotFound("ingestion job"))?;
        job.status = JobStatus::Completed;
        job.topic_count = commit.topics.len() as i32;
        job.question_count = commit.questions.len() as i32;
        job.error_message = None;
        job.processed_at = Some(commit.processed_at);
        Ok(job.clone())
    }

    async fn fail_job(
        &self,
        job_id: &str,
        message: &str,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.jobs.get_mut(job_id) {
            Some(job) if job.status == JobStatus::Processing => {
                job.status = JobStatus::Failed;
                job.error_message = Some(message.to_string());
                job.processed_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn publish_job(
        &self,
        job_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<IngestionJob, StoreError> {
        let mut tables = self.tables.lock().await;
        let job = tables.jobs.get_mut(job_id).ok_or(StoreError::NotFound("ingestion job"))?;
        if job.status != JobStatus::Completed {
            return Err(StoreError::InvalidState(format!(
                "job {job_id} is {}, only completed jobs can be published",
                job.status.as_str()
            )));
        }
        job.status = JobStatus::Published;
        job.published_at = Some(now);
        Ok(job.clone())
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let job = tables.jobs.get(job_id).ok_or(StoreError::NotFound("ingestion job"))?;
        if !job.status.is_terminal() {
            return Err(StoreError::InvalidState(format!("job {job_id} is still processing")));
        }
        tables.jobs.remove(job_id);
        let removed: Vec<String> = tables
            .topics
            .iter()
            .filter(|topic| topic.job_id.as_deref() == Some(job_id))
            .map(|topic| topic.id.clone())
            .collect();
        tables.topics.retain(|topic| !removed.contains(&topic.id));
        tables.questions.retain(|question| !removed.contains(&question.topic_id));
        Ok(())
    }

    async fn list_stale_jobs(
        &self,
        created_before: PrimitiveDateTime,
    ) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Processing && job.created_at < created_before)
            .map(|job| job.id.clone())
            .collect())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn job_content(&self, job_id: &str) -> Result<Vec<(Topic, Vec<Question>)>, StoreError> {
        let tables = self.tables.lock().await;
        let mut topics: Vec<Topic> = tables
            .topics
            .iter()
            .filter(|topic| topic.job_id.as_deref() == Some(job_id))
            .cloned()
            .collect();
        topics.sort_by_key(|topic| topic.position);
        Ok(topics
            .into_iter()
            .map(|topic| {
                let questions = tables
                    .questions
                    .iter()
                    .filter(|question| question.topic_id == topic.id)
                    .cloned()
                    .collect();
                (topic, questions)
            })
            .collect())
    }

    async fn list_published_topics(
        &self,
        grade: i16,
        subject: Option<&str>,
    ) -> Result<Vec<Topic>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .topics
            .iter()
            .filter(|topic| topic.status == TopicStatus::Published && topic.grade == grade)
            .filter(|topic| subject.map_or(true, |subject| topic.subject == subject))
            .cloned()
            .collect())
    }

    async fn list_questions(
        &self,
        topic_id: &str,
        limit: i64,
    ) -> Result<Vec<Question>, StoreError> {
        let tables = self.tables.lock().await;
        let mut questions: Vec<Question> = tables
            .questions
            .iter()
            .filter(|question| question.topic_id == topic_id)
            .cloned()
            .collect();
        questions.sort_by_key(|question| question.difficulty);
        questions.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(questions)
    }

    async fn find_question(&self, question_id: &str) -> Result<Option<Question>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.questions.iter().find(|question| question.id == question_id).cloned())
    }
}

#[async_trait]
impl MasteryStore for MemoryStore {
    async fn record_answer(
        &self,
        student_id: &str,
        topic_id: &str,
        update: &MasteryUpdate<'_>,
        effect: &AnswerEffect,
        level_for: fn(i64) -> i32,
    ) -> Result<MasteryRecord, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.students.contains_key(student_id) {
            return Err(StoreError::NotFound("student"));
        }

        let key = (student_id.to_string(), topic_id.to_string());
        let next = update(tables.mastery.get(&key));
        match effect {
            AnswerEffect::Mistake(mistake) => tables.mistakes.push(mistake.clone()),
            AnswerEffect::Reward(grant) => {
                grant_reward(&mut tables, grant, level_for)?;
            }
        }
        tables.mastery.insert(key, next.clone());
        Ok(next)
    }

    async fn list_mastery(&self, student_id: &str) -> Result<Vec<MasteryRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .mastery
            .values()
            .filter(|record| record.student_id == student_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RewardStore for MemoryStore {
    async fn find_student(&self, student_id: &str) -> Result<Option<StudentProfile>, StoreError> {
        Ok(self.tables.lock().await.students.get(student_id).cloned())
    }

    async fn apply_reward(
        &self,
        grant: &RewardGrant,
        level_for: fn(i64) -> i32,
    ) -> Result<StudentProfile, StoreError> {
        let mut tables = self.tables.lock().await;
        grant_reward(&mut tables, grant, level_for)
    }

    async fn leaderboard(
        &self,
        grade: Option<i16>,
        limit: i64,
    ) -> Result<Vec<StudentProfile>, StoreError> {
        let tables = self.tables.lock().await;
        let mut profiles: Vec<StudentProfile> = tables
            .students
            .values()
            .filter(|profile| grade.map_or(true, |grade| profile.grade == grade))
            .cloned()
            .collect();
        profiles.sort_by(|a, b| {
            b.xp.cmp(&a.xp)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        profiles.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(profiles)
    }

    async fn count_ahead(&self, grade: Option<i16>, xp: i64) -> Result<i64, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .students
            .values()
            .filter(|profile| grade.map_or(true, |grade| profile.grade == grade))
            .filter(|profile| profile.xp > xp)
            .count() as i64)
    }
}

fn grant_reward(
    tables: &mut Tables,
    grant: &RewardGrant,
    level_for: fn(i64) -> i32,
) -> Result<StudentProfile, StoreError> {
    let profile =
        tables.students.get_mut(&grant.event.student_id).ok_or(StoreError::NotFound("student"))?;
    profile.xp = profile.xp.saturating_add(grant.event.xp_delta);
    profile.level = level_for(profile.xp);
    profile.streak_freezes += grant.streak_freezes;
    let updated = profile.clone();
    tables.rewards.push(grant.event.clone());
    Ok(updated)
}
