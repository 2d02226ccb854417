use axum::extract::{Path, Query, State};
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::api::validation::clamp_limit;
use crate::core::state::AppState;
use crate::schemas::chapter::{QuestionResponse, TopicResponse};
use crate::schemas::practice::{
    AnswerSubmitRequest, AnswerSubmitResponse, MasteryResponse, QuestionsQuery, TopicsQuery,
    MAX_PRACTICE_QUESTIONS,
};
use crate::services::mastery::AnswerEvent;

pub(super) async fn list_topics(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Query(query): Query<TopicsQuery>,
) -> Result<Json<Vec<TopicResponse>>, ApiError> {
    let subject = query.subject.as_deref().map(str::trim).filter(|subject| !subject.is_empty());
    let topics =
        state.services().content.list_published_topics(student.grade, subject).await?;
    Ok(Json(topics.into_iter().map(TopicResponse::from).collect()))
}

pub(super) async fn list_questions(
    CurrentStudent(_student): CurrentStudent,
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Query(query): Query<QuestionsQuery>,
) -> Result<Json<Vec<QuestionResponse>>, ApiError> {
    let limit = clamp_limit(Some(query.limit), MAX_PRACTICE_QUESTIONS, MAX_PRACTICE_QUESTIONS);
    let questions = state.services().content.list_questions(&topic_id, limit).await?;
    Ok(Json(questions.into_iter().map(QuestionResponse::from).collect()))
}

pub(super) async fn submit_answer(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<AnswerSubmitRequest>,
) -> Result<Json<AnswerSubmitResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let question = state
        .services()
        .content
        .find_question(&payload.question_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;
    if question.topic_id != payload.topic_id {
        return Err(ApiError::BadRequest("Question does not belong to this topic".to_string()));
    }

    let result = state
        .services()
        .mastery
        .submit_answer(&AnswerEvent {
            student_id: student.id,
            topic_id: payload.topic_id,
            question_id: payload.question_id,
            is_correct: payload.is_correct,
        })
        .await?;

    Ok(Json(AnswerSubmitResponse {
        accepted: true,
        score: result.record.score,
        tier: result.record.tier,
        revision_count: result.record.revision_count,
        xp_awarded: result.xp_awarded,
    }))
}

pub(super) async fn list_mastery(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Vec<MasteryResponse>>, ApiError> {
    let records = state.services().mastery.list_for_student(&student.id).await?;
    Ok(Json(records.into_iter().map(MasteryResponse::from).collect()))
}
