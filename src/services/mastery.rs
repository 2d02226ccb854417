//! Per-student, per-topic mastery scoring driven by practice answers.

use std::sync::Arc;

use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::{MasteryRecord, MistakeLog};
use crate::db::types::{MasteryTier, MistakeType, RewardSource};
use crate::services::rewards::{level_for_xp, xp_grant};
use crate::stores::{AnswerEffect, MasteryStore, StoreError};

pub(crate) const CORRECT_DELTA: i32 = 10;
pub(crate) const INCORRECT_DELTA: i32 = -5;
pub(crate) const MASTERED_THRESHOLD: i32 = 80;
pub(crate) const DEVELOPING_THRESHOLD: i32 = 50;
pub(crate) const CORRECT_ANSWER_XP: i64 = 10;

pub(crate) fn tier_for_score(score: i32) -> MasteryTier {
    if score >= MASTERED_THRESHOLD {
        MasteryTier::Mastered
    } else if score >= DEVELOPING_THRESHOLD {
        MasteryTier::Developing
    } else {
        MasteryTier::Weak
    }
}

/// A first answer starts from zero, so it scores 10 or 0.
pub(crate) fn next_score(current: Option<i32>, is_correct: bool) -> i32 {
    let delta = if is_correct { CORRECT_DELTA } else { INCORRECT_DELTA };
    (current.unwrap_or(0) + delta).clamp(0, 100)
}

pub(crate) fn apply_answer(
    existing: Option<&MasteryRecord>,
    student_id: &str,
    topic_id: &str,
    is_correct: bool,
    now: time::PrimitiveDateTime,
) -> MasteryRecord {
    let score = next_score(existing.map(|record| record.score), is_correct);
    MasteryRecord {
        student_id: student_id.to_string(),
        topic_id: topic_id.to_string(),
        score,
        tier: tier_for_score(score),
        revision_count: existing.map_or(1, |record| record.revision_count + 1),
        last_reviewed_at: now,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AnswerEvent {
    pub(crate) student_id: String,
    pub(crate) topic_id: String,
    pub(crate) question_id: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct AnswerResult {
    pub(crate) record: MasteryRecord,
    pub(crate) xp_awarded: i64,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum MasteryError {
    #[error("student profile not found")]
    StudentNotFound,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for MasteryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound("student") => Self::StudentNotFound,
            other => Self::Store(other),
        }
    }
}

#[derive(Clone)]
pub(crate) struct MasteryEngine {
    store: Arc<dyn MasteryStore>,
}

impl MasteryEngine {
    pub(crate) fn new(store: Arc<dyn MasteryStore>) -> Self {
        Self { store }
    }

    /// Updates the mastery record together with its mistake log or xp award,
    /// in one transaction. A serialization conflict is retried once.
    pub(crate) async fn submit_answer(
        &self,
        event: &AnswerEvent,
    ) -> Result<AnswerResult, MasteryError> {
        let (effect, xp_awarded) = if event.is_correct {
            let grant = xp_grant(&event.student_id, CORRECT_ANSWER_XP, RewardSource::AnswerCorrect);
            (AnswerEffect::Reward(grant), CORRECT_ANSWER_XP)
        } else {
            let mistake = MistakeLog {
                id: Uuid::new_v4().to_string(),
                student_id: event.student_id.clone(),
                question_id: event.question_id.clone(),
                topic_id: event.topic_id.clone(),
                mistake_type: MistakeType::Conceptual,
                created_at: primitive_now_utc(),
            };
            (AnswerEffect::Mistake(mistake), 0)
        };

        let record = match self.record(event, &effect).await {
            Err(StoreError::Conflict) => {
                tracing::debug!(
                    student_id = %event.student_id,
                    topic_id = %event.topic_id,
                    "Retrying mastery update after conflict"
                );
                self.record(event, &effect).await?
            }
            other => other?,
        };

        metrics::counter!(
            "mastery_updates_total",
            "correct" => if event.is_correct { "true" } else { "false" }
        )
        .increment(1);

        Ok(AnswerResult { record, xp_awarded })
    }

    pub(crate) async fn list_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<MasteryRecord>, StoreError> {
        self.store.list_mastery(student_id).await
    }

    async fn record(
        &self,
        event: &AnswerEvent,
        effect: &AnswerEffect,
    ) -> Result<MasteryRecord, StoreError> {
        let now = primitive_now_utc();
        let student_id = event.student_id.as_str();
        let topic_id = event.topic_id.as_str();
        let is_correct = event.is_correct;
        let update = move |existing: Option<&MasteryRecord>| {
            apply_answer(existing, student_id, topic_id, is_correct, now)
        };
        self.store.record_answer(student_id, topic_id, &update, effect, level_for_xp).await
    }
}
