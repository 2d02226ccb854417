use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    JobStatus, MasteryTier, MistakeType, QuestionType, RewardSource, TopicStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct IngestionJob {
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) subject: String,
    pub(crate) grade: i16,
    pub(crate) name: String,
    pub(crate) document_ref: String,
    pub(crate) status: JobStatus,
    pub(crate) topic_count: i32,
    pub(crate) question_count: i32,
    pub(crate) error_message: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) processed_at: Option<PrimitiveDateTime>,
    pub(crate) published_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Topic {
    pub(crate) id: String,
    pub(crate) job_id: Option<String>,
    pub(crate) name: String,
    pub(crate) subject: String,
    pub(crate) grade: i16,
    pub(crate) position: i32,
    pub(crate) theory: String,
    pub(crate) eli5: String,
    pub(crate) story: String,
    pub(crate) examples: Json<Vec<String>>,
    pub(crate) status: TopicStatus,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) topic_id: String,
    pub(crate) content: String,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Option<Json<Vec<String>>>,
    pub(crate) correct_answer: String,
    pub(crate) explanation: String,
    pub(crate) difficulty: i16,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct MasteryRecord {
    pub(crate) student_id: String,
    pub(crate) topic_id: String,
    pub(crate) score: i32,
    pub(crate) tier: MasteryTier,
    pub(crate) revision_count: i32,
    pub(crate) last_reviewed_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct StudentProfile {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) full_name: String,
    pub(crate) grade: i16,
    pub(crate) xp: i64,
    pub(crate) level: i32,
    pub(crate) streak_freezes: i32,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct RewardEvent {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) xp_delta: i64,
    pub(crate) source: RewardSource,
    pub(crate) badge: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct MistakeLog {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) question_id: String,
    pub(crate) topic_id: String,
    pub(crate) mistake_type: MistakeType,
    pub(crate) created_at: PrimitiveDateTime,
}
