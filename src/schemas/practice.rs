use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::MasteryRecord;
use crate::db::types::MasteryTier;

pub(crate) const MAX_PRACTICE_QUESTIONS: i64 = 10;

#[derive(Debug, Deserialize)]
pub(crate) struct TopicsQuery {
    #[serde(default)]
    pub(crate) subject: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionsQuery {
    #[serde(default = "default_question_limit")]
    pub(crate) limit: i64,
}

fn default_question_limit() -> i64 {
    MAX_PRACTICE_QUESTIONS
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerSubmitRequest {
    #[validate(length(min = 1, message = "topic_id is required"))]
    pub(crate) topic_id: String,
    #[validate(length(min = 1, message = "question_id is required"))]
    pub(crate) question_id: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerSubmitResponse {
    pub(crate) accepted: bool,
    pub(crate) score: i32,
    pub(crate) tier: MasteryTier,
    pub(crate) revision_count: i32,
    pub(crate) xp_awarded: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct MasteryResponse {
    pub(crate) topic_id: String,
    pub(crate) score: i32,
    pub(crate) tier: MasteryTier,
    pub(crate) revision_count: i32,
    pub(crate) last_reviewed_at: String,
}

impl From<MasteryRecord> for MasteryResponse {
    fn from(record: MasteryRecord) -> Self {
        Self {
            topic_id: record.topic_id,
            score: record.score,
            tier: record.tier,
            revision_count: record.revision_count,
            last_reviewed_at: format_primitive(record.last_reviewed_at),
        }
    }
}
