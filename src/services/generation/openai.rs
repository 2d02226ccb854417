use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::parsing::{parse_questions, parse_topic_content, parse_topics};
use super::{ExtractedTopic, GenerationClient, GenerationError, QuestionDraft, TopicContent};
use crate::core::config::Settings;

const SYSTEM_PROMPT: &str = "You are an experienced school teacher who writes clear, \
    age-appropriate learning material. Always answer with a single JSON object and nothing else.";

/// Chat-completions backend. Every call asks for a JSON object response.
#[derive(Debug, Clone)]
pub(crate) struct OpenAiGenerationClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    max_retries: u32,
}

impl OpenAiGenerationClient {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.ai().ai_request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ai().openai_api_key.clone(),
            base_url: settings.ai().openai_base_url.trim_end_matches('/').to_string(),
            model: settings.ai().ai_model.clone(),
            max_tokens: settings.ai().ai_max_tokens,
            temperature: settings.ai().ai_temperature,
            max_retries: settings.ai().ai_max_retries,
        })
    }

    async fn complete(
        &self,
        stage: &'static str,
        prompt: String,
    ) -> Result<String, GenerationError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"}
        });

        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = None;
        let mut body = Value::Null;

        for attempt in 0..=self.max_retries {
            let response =
                self.client.post(&url).bearer_auth(&self.api_key).json(&payload).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    body = resp.json().await.unwrap_or(Value::Null);
                    if status.is_success() {
                        last_error = None;
                        break;
                    }
                    last_error = Some(GenerationError::Api {
                        status: status.as_u16(),
                        body: body.to_string(),
                    });
                    // Client errors other than rate limiting will not improve on retry.
                    if status.is_client_error() && status.as_u16() != 429 {
                        break;
                    }
                }
                Err(err) => {
                    last_error = Some(GenerationError::Request(err.to_string()));
                }
            }

            if attempt < self.max_retries {
                tracing::warn!(stage, attempt, "Generation request failed, retrying");
                tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt.min(5)))).await;
            }
        }

        if let Some(err) = last_error {
            return Err(err);
        }

        let tokens_used = body
            .get("usage")
            .and_then(|usage| usage.get("total_tokens"))
            .and_then(Value::as_u64);
        tracing::debug!(stage, tokens_used, model = %self.model, "Generation request completed");

        body.get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GenerationError::Malformed("missing completion content".into()))
    }
}

#[async_trait]
impl GenerationClient for OpenAiGenerationClient {
    async fn extract_topics(
        &self,
        text: &str,
        subject: &str,
        grade: i16,
    ) -> Result<Vec<ExtractedTopic>, GenerationError> {
        let prompt = format!(
            "Analyze this grade {grade} {subject} chapter and identify 3 to 5 main topics.\n\
             Respond as {{\"topics\": [{{\"name\": \"...\"}}]}}.\n\nChapter text:\n{text}"
        );
        let raw = self.complete("extract_topics", prompt).await?;
        parse_topics(&raw)
    }

    async fn generate_topic_content(
        &self,
        topic_name: &str,
        context: &str,
        grade: i16,
    ) -> Result<TopicContent, GenerationError> {
        let prompt = format!(
            "Write learning material on \"{topic_name}\" for a grade {grade} student.\n\
             Respond as {{\"theory\": \"...\", \"eli5\": \"...\", \"story\": \"...\", \
             \"examples\": [\"...\"]}} where eli5 explains it like the reader is five and \
             story is a short memorable narrative.\n\nSource material:\n{context}"
        );
        let raw = self.complete("topic_content", prompt).await?;
        parse_topic_content(&raw)
    }

    async fn generate_questions(
        &self,
        topic_name: &str,
        theory: &str,
        grade: i16,
        count: u32,
    ) -> Result<Vec<QuestionDraft>, GenerationError> {
        let prompt = format!(
            "Create {count} practice questions on \"{topic_name}\" for a grade {grade} student.\n\
             Mix the types MCQ, FILL_BLANK and SHORT. Respond as {{\"questions\": [{{\
             \"content\": \"...\", \"question_type\": \"MCQ\", \"options\": [\"...\"], \
             \"correct_answer\": \"...\", \"explanation\": \"...\", \"difficulty\": 1}}]}}. \
             Options are required for MCQ only and must contain the correct answer. \
             Difficulty ranges from 1 to 5.\n\nTheory:\n{theory}"
        );
        let raw = self.complete("questions", prompt).await?;
        parse_questions(&raw)
    }
}
