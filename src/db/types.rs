use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "ingestionjobstatus", rename_all = "lowercase")]
pub(crate) enum JobStatus {
    Processing,
    Completed,
    Published,
    Failed,
}

impl JobStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    pub(crate) fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "topicstatus", rename_all = "lowercase")]
pub(crate) enum TopicStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questiontype", rename_all = "snake_case")]
pub(crate) enum QuestionType {
    Mcq,
    FillBlank,
    ShortAnswer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "masterytier", rename_all = "lowercase")]
pub(crate) enum MasteryTier {
    Weak,
    Developing,
    Mastered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "mistaketype", rename_all = "lowercase")]
pub(crate) enum MistakeType {
    Conceptual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "rewardsource", rename_all = "snake_case")]
pub(crate) enum RewardSource {
    AnswerCorrect,
    SpinWheel,
}

impl RewardSource {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::AnswerCorrect => "answer_correct",
            Self::SpinWheel => "spin_wheel",
        }
    }
}
