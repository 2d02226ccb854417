//! Contract between the chapter pipeline and the text-generation backend.

mod openai;
pub(crate) mod parsing;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub(crate) use openai::OpenAiGenerationClient;

#[derive(Debug, Error)]
pub(crate) enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),
    #[error("generation service returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed generation response: {0}")]
    Malformed(String),
    #[error("no topics identified in the document")]
    NoTopics,
    #[error("document unavailable: {0}")]
    Document(String),
    #[error("chapter generation timed out after {0} seconds")]
    TimedOut(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExtractedTopic {
    pub(crate) name: String,
}

/// Teaching material for one topic. Missing fields come back empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TopicContent {
    pub(crate) theory: String,
    pub(crate) eli5: String,
    pub(crate) story: String,
    pub(crate) examples: Vec<String>,
}

/// A question as the backend produced it, before validation.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub(crate) struct QuestionDraft {
    #[serde(alias = "question", alias = "text")]
    pub(crate) content: Option<String>,
    #[serde(alias = "type")]
    pub(crate) question_type: Option<String>,
    pub(crate) options: Option<Vec<String>>,
    #[serde(alias = "correctAnswer", alias = "answer")]
    pub(crate) correct_answer: Option<String>,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: Option<i64>,
}

#[async_trait]
pub(crate) trait GenerationClient: Send + Sync {
    async fn extract_topics(
        &self,
        text: &str,
        subject: &str,
        grade: i16,
    ) -> Result<Vec<ExtractedTopic>, GenerationError>;

    async fn generate_topic_content(
        &self,
        topic_name: &str,
        context: &str,
        grade: i16,
    ) -> Result<TopicContent, GenerationError>;

    async fn generate_questions(
        &self,
        topic_name: &str,
        theory: &str,
        grade: i16,
        count: u32,
    ) -> Result<Vec<QuestionDraft>, GenerationError>;
}
