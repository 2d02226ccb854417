//! Lenient decoding of backend payloads. Accepts a bare array or a wrapper
//! object for lists and tolerates missing or oddly typed fields.

use serde_json::Value;

use super::{ExtractedTopic, GenerationError, QuestionDraft, TopicContent};

pub(crate) fn parse_topics(raw: &str) -> Result<Vec<ExtractedTopic>, GenerationError> {
    let value = parse_json(raw)?;
    let entries = unwrap_list(value, &["topics", "items"])?;

    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(name) => Some(name),
            Value::Object(map) => {
                ["name", "title", "topic"].iter().find_map(|key| {
                    map.get(*key).and_then(Value::as_str).map(str::to_string)
                })
            }
            _ => None,
        })
        .map(|name| ExtractedTopic { name })
        .collect())
}

pub(crate) fn parse_topic_content(raw: &str) -> Result<TopicContent, GenerationError> {
    let value = parse_json(raw)?;
    let Value::Object(map) = value else {
        return Err(GenerationError::Malformed("topic content is not a JSON object".into()));
    };

    let text = |key: &str| map.get(key).map(value_to_text).unwrap_or_default();
    let examples = match map.get("examples") {
        Some(Value::Array(items)) => items
            .iter()
            .map(value_to_text)
            .filter(|example| !example.trim().is_empty())
            .collect(),
        Some(Value::String(single)) if !single.trim().is_empty() => vec![single.clone()],
        _ => Vec::new(),
    };

    Ok(TopicContent { theory: text("theory"), eli5: text("eli5"), story: text("story"), examples })
}

pub(crate) fn parse_questions(raw: &str) -> Result<Vec<QuestionDraft>, GenerationError> {
    let value = parse_json(raw)?;
    let entries = unwrap_list(value, &["questions", "items"])?;

    Ok(entries
        .into_iter()
        .filter(Value::is_object)
        .map(|entry| draft_from_value(&entry))
        .collect())
}

fn draft_from_value(entry: &Value) -> QuestionDraft {
    let mut draft: QuestionDraft = serde_json::from_value(entry.clone()).unwrap_or_default();
    // Field-by-field fallback when one field has the wrong JSON type.
    if draft == QuestionDraft::default() {
        let field = |keys: &[&str]| {
            keys.iter().find_map(|key| entry.get(*key)).map(value_to_text)
        };
        draft.content = field(&["content", "question", "text"]);
        draft.question_type = field(&["question_type", "type"]);
        draft.correct_answer = field(&["correct_answer", "correctAnswer", "answer"]);
        draft.explanation = field(&["explanation"]);
        draft.options = entry
            .get("options")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(value_to_text).collect());
        draft.difficulty = entry.get("difficulty").and_then(|value| {
            value.as_i64().or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
        });
    }
    draft
}

fn parse_json(raw: &str) -> Result<Value, GenerationError> {
    let trimmed = strip_code_fence(raw.trim());
    serde_json::from_str(trimmed).map_err(|err| GenerationError::Malformed(err.to_string()))
}

fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn unwrap_list(value: Value, keys: &[&str]) -> Result<Vec<Value>, GenerationError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in keys {
                if let Some(Value::Array(items)) = map.remove(*key) {
                    return Ok(items);
                }
            }
            Err(GenerationError::Malformed(format!("expected a list under one of {keys:?}")))
        }
        other => Err(GenerationError::Malformed(format!("expected a list, got {other}"))),
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
