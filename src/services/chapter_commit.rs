use std::fmt::Display;
use std::sync::Arc;

use sqlx::types::Json;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::{IngestionJob, Question, Topic};
use crate::db::types::TopicStatus;
use crate::services::chapter_pipeline::GeneratedChapter;
use crate::stores::{ChapterCommit, JobStore, StoreError};

pub(crate) const MAX_ERROR_MESSAGE_CHARS: usize = 1_000;

/// Generated topics go live for practice as soon as the job completes.
pub(crate) const GENERATED_TOPIC_STATUS: TopicStatus = TopicStatus::Published;

#[derive(Clone)]
pub(crate) struct ChapterCommitter {
    jobs: Arc<dyn JobStore>,
}

impl ChapterCommitter {
    pub(crate) fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self { jobs }
    }

    /// Writes the whole chapter and completes the job, or writes nothing.
    pub(crate) async fn commit_success(
        &self,
        job: &IngestionJob,
        chapter: GeneratedChapter,
    ) -> Result<IngestionJob, StoreError> {
        let commit = build_commit(job, chapter);
        self.jobs.commit_chapter(&commit).await
    }

    pub(crate) async fn commit_failure(
        &self,
        job_id: &str,
        error: &(dyn Display + Sync),
    ) -> Result<bool, StoreError> {
        let message = bounded_error_message(error);
        self.jobs.fail_job(job_id, &message, primitive_now_utc()).await
    }
}

fn build_commit(job: &IngestionJob, chapter: GeneratedChapter) -> ChapterCommit {
    let now = primitive_now_utc();
    let mut topics = Vec::with_capacity(chapter.topics.len());
    let mut questions = Vec::with_capacity(chapter.question_count());

    for (position, generated) in chapter.topics.into_iter().enumerate() {
        let topic_id = Uuid::new_v4().to_string();
        for question in generated.questions {
            questions.push(Question {
                id: Uuid::new_v4().to_string(),
                topic_id: topic_id.clone(),
                content: question.content,
                question_type: question.question_type,
                options: question.options.map(Json),
                correct_answer: question.correct_answer,
                explanation: question.explanation,
                difficulty: question.difficulty,
                created_at: now,
            });
        }
        topics.push(Topic {
            id: topic_id,
            job_id: Some(job.id.clone()),
            name: generated.name,
            subject: job.subject.clone(),
            grade: job.grade,
            position: position as i32,
            theory: generated.content.theory,
            eli5: generated.content.eli5,
            story: generated.content.story,
            examples: Json(generated.content.examples),
            status: GENERATED_TOPIC_STATUS,
            created_at: now,
        });
    }

    ChapterCommit { job_id: job.id.clone(), topics, questions, processed_at: now }
}

pub(crate) fn bounded_error_message(error: &dyn Display) -> String {
    let message = error.to_string();
    match message.char_indices().nth(MAX_ERROR_MESSAGE_CHARS) {
        Some((index, _)) => message[..index].to_string(),
        None => message,
    }
}
