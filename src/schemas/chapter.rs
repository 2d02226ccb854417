use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::{format_optional, format_primitive};
use crate::db::models::{IngestionJob, Question, Topic};
use crate::db::types::{JobStatus, QuestionType, TopicStatus};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ChapterSubmitRequest {
    #[validate(length(min = 1, max = 120, message = "subject must contain 1..120 characters"))]
    pub(crate) subject: String,
    #[validate(range(min = 1, max = 8, message = "grade must be in range 1..8"))]
    pub(crate) grade: i16,
    #[serde(default)]
    #[validate(length(max = 255, message = "name must be at most 255 characters"))]
    pub(crate) name: Option<String>,
    #[validate(length(
        min = 1,
        max = 1024,
        message = "document_ref must contain 1..1024 characters"
    ))]
    pub(crate) document_ref: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChapterSubmitResponse {
    pub(crate) job_id: String,
    pub(crate) status: JobStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UploadUrlRequest {
    #[validate(length(min = 1, max = 255, message = "filename must contain 1..255 characters"))]
    pub(crate) filename: String,
    #[serde(default = "default_content_type")]
    pub(crate) content_type: String,
}

fn default_content_type() -> String {
    "text/plain".to_string()
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadUrlResponse {
    pub(crate) upload_url: String,
    pub(crate) document_ref: String,
    pub(crate) expires_in_seconds: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChapterJobResponse {
    pub(crate) job_id: String,
    pub(crate) name: String,
    pub(crate) subject: String,
    pub(crate) grade: i16,
    pub(crate) status: JobStatus,
    pub(crate) topic_count: i32,
    pub(crate) question_count: i32,
    pub(crate) error_message: Option<String>,
    pub(crate) created_at: String,
    pub(crate) processed_at: Option<String>,
    pub(crate) published_at: Option<String>,
}

impl From<IngestionJob> for ChapterJobResponse {
    fn from(job: IngestionJob) -> Self {
        Self {
            job_id: job.id,
            name: job.name,
            subject: job.subject,
            grade: job.grade,
            status: job.status,
            topic_count: job.topic_count,
            question_count: job.question_count,
            error_message: job.error_message,
            created_at: format_primitive(job.created_at),
            processed_at: format_optional(job.processed_at),
            published_at: format_optional(job.published_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) topic_id: String,
    pub(crate) content: String,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Option<Vec<String>>,
    pub(crate) correct_answer: String,
    pub(crate) explanation: String,
    pub(crate) difficulty: i16,
}

impl From<Question> for QuestionResponse {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            topic_id: question.topic_id,
            content: question.content,
            question_type: question.question_type,
            options: question.options.map(|options| options.0),
            correct_answer: question.correct_answer,
            explanation: question.explanation,
            difficulty: question.difficulty,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TopicResponse {
    pub(crate) id: String,
    pub(crate) job_id: Option<String>,
    pub(crate) name: String,
    pub(crate) subject: String,
    pub(crate) grade: i16,
    pub(crate) position: i32,
    pub(crate) theory: String,
    pub(crate) eli5: String,
    pub(crate) story: String,
    pub(crate) examples: Vec<String>,
    pub(crate) status: TopicStatus,
    pub(crate) created_at: String,
}

impl From<Topic> for TopicResponse {
    fn from(topic: Topic) -> Self {
        Self {
            id: topic.id,
            job_id: topic.job_id,
            name: topic.name,
            subject: topic.subject,
            grade: topic.grade,
            position: topic.position,
            theory: topic.theory,
            eli5: topic.eli5,
            story: topic.story,
            examples: topic.examples.0,
            status: topic.status,
            created_at: format_primitive(topic.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TopicWithQuestionsResponse {
    #[serde(flatten)]
    pub(crate) topic: TopicResponse,
    pub(crate) questions: Vec<QuestionResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChapterContentResponse {
    pub(crate) job: ChapterJobResponse,
    pub(crate) topics: Vec<TopicWithQuestionsResponse>,
}
