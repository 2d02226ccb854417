//! Multi-stage generation of a chapter: topic extraction, then per-topic
//! content and questions. Nothing is persisted here.

use std::collections::HashSet;
use std::sync::Arc;

use crate::db::types::QuestionType;
use crate::services::generation::{
    GenerationClient, GenerationError, QuestionDraft, TopicContent,
};

pub(crate) const MAX_TOPICS_PER_JOB: usize = 10;
pub(crate) const QUESTIONS_PER_TOPIC: u32 = 5;
pub(crate) const TOPIC_EXTRACTION_CHARS: usize = 15_000;
pub(crate) const CONTENT_CONTEXT_CHARS: usize = 5_000;
pub(crate) const QUESTION_SEED_CHARS: usize = 1_000;
pub(crate) const DEFAULT_DIFFICULTY: i16 = 3;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ChapterRequest<'a> {
    pub(crate) source_text: &'a str,
    pub(crate) subject: &'a str,
    pub(crate) grade: i16,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GeneratedQuestion {
    pub(crate) content: String,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Option<Vec<String>>,
    pub(crate) correct_answer: String,
    pub(crate) explanation: String,
    pub(crate) difficulty: i16,
}

#[derive(Debug, Clone)]
pub(crate) struct GeneratedTopic {
    pub(crate) name: String,
    pub(crate) content: TopicContent,
    pub(crate) questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Clone)]
pub(crate) struct GeneratedChapter {
    pub(crate) topics: Vec<GeneratedTopic>,
}

impl GeneratedChapter {
    pub(crate) fn question_count(&self) -> usize {
        self.topics.iter().map(|topic| topic.questions.len()).sum()
    }
}

#[derive(Clone)]
pub(crate) struct ChapterPipeline {
    client: Arc<dyn GenerationClient>,
}

impl ChapterPipeline {
    pub(crate) fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self { client }
    }

    /// Runs every stage in order. Any client error aborts the whole chapter.
    pub(crate) async fn generate(
        &self,
        request: ChapterRequest<'_>,
    ) -> Result<GeneratedChapter, GenerationError> {
        let extraction_text = truncate_chars(request.source_text, TOPIC_EXTRACTION_CHARS);
        let extracted =
            self.client.extract_topics(extraction_text, request.subject, request.grade).await?;
        let names = normalize_topic_names(extracted.into_iter().map(|topic| topic.name));
        if names.is_empty() {
            return Err(GenerationError::NoTopics);
        }

        let context = truncate_chars(request.source_text, CONTENT_CONTEXT_CHARS);
        let mut topics = Vec::with_capacity(names.len());
        for name in names {
            let content =
                self.client.generate_topic_content(&name, context, request.grade).await?;
            let seed = truncate_chars(&content.theory, QUESTION_SEED_CHARS);
            let drafts = self
                .client
                .generate_questions(&name, seed, request.grade, QUESTIONS_PER_TOPIC)
                .await?;

            let total = drafts.len();
            let questions: Vec<GeneratedQuestion> =
                drafts.into_iter().filter_map(validate_question).collect();
            if questions.len() < total {
                tracing::warn!(
                    topic = %name,
                    dropped = total - questions.len(),
                    "Dropped invalid generated questions"
                );
            }

            topics.push(GeneratedTopic { name, content, questions });
        }

        Ok(GeneratedChapter { topics })
    }
}

/// Trims, drops blanks and case-insensitive duplicates, caps the count.
pub(crate) fn normalize_topic_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_lowercase()))
        .take(MAX_TOPICS_PER_JOB)
        .collect()
}

pub(crate) fn validate_question(draft: QuestionDraft) -> Option<GeneratedQuestion> {
    let content = non_blank(draft.content)?;
    let correct_answer = non_blank(draft.correct_answer)?;
    let question_type = parse_question_type(draft.question_type.as_deref()?)?;

    let (options, correct_answer) = if question_type == QuestionType::Mcq {
        let mut seen = HashSet::new();
        let options: Vec<String> = draft
            .options
            .unwrap_or_default()
            .into_iter()
            .map(|option| option.trim().to_string())
            .filter(|option| !option.is_empty() && seen.insert(option.clone()))
            .collect();
        if options.len() < 2 {
            return None;
        }
        // The stored answer must be one of the options verbatim.
        let matched = options
            .iter()
            .find(|option| option.eq_ignore_ascii_case(&correct_answer))?
            .clone();
        (Some(options), matched)
    } else {
        (None, correct_answer)
    };

    let difficulty = draft
        .difficulty
        .map(|value| value.clamp(1, 5) as i16)
        .unwrap_or(DEFAULT_DIFFICULTY);

    Some(GeneratedQuestion {
        content,
        question_type,
        options,
        correct_answer,
        explanation: draft.explanation.map(|text| text.trim().to_string()).unwrap_or_default(),
        difficulty,
    })
}

fn parse_question_type(raw: &str) -> Option<QuestionType> {
    let normalized = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
    match normalized.as_str() {
        "MCQ" | "MULTIPLE_CHOICE" => Some(QuestionType::Mcq),
        "FILL_BLANK" | "FILL_IN_THE_BLANK" | "FILL_IN_BLANK" => Some(QuestionType::FillBlank),
        "SHORT" | "SHORT_ANSWER" | "LONG" | "LONG_ANSWER" => Some(QuestionType::ShortAnswer),
        _ => None,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|text| text.trim().to_string()).filter(|text| !text.is_empty())
}

/// Longest prefix of at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
