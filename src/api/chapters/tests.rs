use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::test_support::{self, ScriptedGenerationClient, TestContext, TEST_DOCUMENT_REF};

fn submit_payload(grade: i64) -> Value {
    json!({
        "subject": "Science",
        "grade": grade,
        "name": "Plants",
        "document_ref": TEST_DOCUMENT_REF
    })
}

async fn submit(ctx: &TestContext, token: &str) -> String {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/chapters",
            Some(token),
            Some(submit_payload(5)),
        ))
        .await
        .expect("submit chapter");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::ACCEPTED, "response: {body}");
    assert_eq!(body["status"], "processing");
    body["job_id"].as_str().expect("job id").to_string()
}

async fn get_json(ctx: &TestContext, uri: &str, token: &str) -> (StatusCode, Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, uri, Some(token), None))
        .await
        .expect("get");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

async fn wait_for_terminal(ctx: &TestContext, job_id: &str, token: &str) -> Value {
    for _ in 0..200 {
        let (status, body) = get_json(ctx, &format!("/api/v1/chapters/{job_id}"), token).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        if body["status"] != "processing" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never left processing");
}

#[tokio::test]
async fn teacher_submits_chapter_and_receives_generated_content() {
    let ctx = test_support::setup_test_context().await;
    let token = test_support::teacher_token("teacher-1", ctx.state.settings());

    let job_id = submit(&ctx, &token).await;
    let job = wait_for_terminal(&ctx, &job_id, &token).await;

    assert_eq!(job["status"], "completed");
    assert_eq!(job["topic_count"], 3);
    assert_eq!(job["question_count"], 15);
    assert!(job["processed_at"].is_string());
    assert!(job["error_message"].is_null());

    let (status, content) =
        get_json(&ctx, &format!("/api/v1/chapters/{job_id}/content"), &token).await;
    assert_eq!(status, StatusCode::OK, "response: {content}");
    let topics = content["topics"].as_array().expect("topics");
    assert_eq!(topics.len(), 3);
    assert_eq!(topics[0]["name"], "Photosynthesis");
    assert_eq!(topics[0]["status"], "published");
    assert_eq!(topics[0]["questions"].as_array().map(Vec::len), Some(5));

    let (status, list) = get_json(&ctx, "/api/v1/chapters", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().expect("list").iter().any(|item| item["job_id"] == job_id));
}

#[tokio::test]
async fn publish_then_delete_completed_chapter() {
    let ctx = test_support::setup_test_context().await;
    let token = test_support::teacher_token("teacher-1", ctx.state.settings());
    let job_id = submit(&ctx, &token).await;
    wait_for_terminal(&ctx, &job_id, &token).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/chapters/{job_id}/publish"),
            Some(&token),
            None,
        ))
        .await
        .expect("publish");
    let status = response.status();
    let published = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {published}");
    assert_eq!(published["status"], "published");
    assert!(published["published_at"].is_string());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/chapters/{job_id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(ctx.store.topic_count().await, 0);
    assert!(!ctx.documents.contains(TEST_DOCUMENT_REF));

    let (status, _) = get_json(&ctx, &format!("/api/v1/chapters/{job_id}"), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn processing_chapter_cannot_be_published_or_deleted() {
    let ctx = test_support::setup_test_context_with(
        ScriptedGenerationClient::with_topics(&["Roots"]).with_delay(Duration::from_secs(5)),
    )
    .await;
    let token = test_support::teacher_token("teacher-1", ctx.state.settings());
    let job_id = submit(&ctx, &token).await;

    for (method, uri) in [
        (Method::POST, format!("/api/v1/chapters/{job_id}/publish")),
        (Method::DELETE, format!("/api/v1/chapters/{job_id}")),
    ] {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(method, &uri, Some(&token), None))
            .await
            .expect("request");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::CONFLICT, "response: {body}");
        assert_eq!(body["status"], 409);
    }

    let (_, job) = get_json(&ctx, &format!("/api/v1/chapters/{job_id}"), &token).await;
    assert_eq!(job["status"], "processing");
    assert_eq!(job["topic_count"], 0);
}

#[tokio::test]
async fn failed_generation_surfaces_error_and_no_content() {
    let ctx = test_support::setup_test_context_with(
        ScriptedGenerationClient::with_topics(&["Roots", "Stems"]).failing_content_on("Stems"),
    )
    .await;
    let token = test_support::teacher_token("teacher-1", ctx.state.settings());

    let job_id = submit(&ctx, &token).await;
    let job = wait_for_terminal(&ctx, &job_id, &token).await;

    assert_eq!(job["status"], "failed");
    assert!(job["error_message"].as_str().is_some_and(|message| !message.is_empty()));
    assert_eq!(job["topic_count"], 0);
    let (_, content) = get_json(&ctx, &format!("/api/v1/chapters/{job_id}/content"), &token).await;
    assert_eq!(content["topics"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn submission_requires_teacher_and_valid_grade() {
    let ctx = test_support::setup_test_context().await;
    let teacher = test_support::teacher_token("teacher-1", ctx.state.settings());
    let student = test_support::student_token("s1", ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/chapters",
            None,
            Some(submit_payload(5)),
        ))
        .await
        .expect("anonymous");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/chapters",
            Some(&student),
            Some(submit_payload(5)),
        ))
        .await
        .expect("student");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/chapters",
            Some(&teacher),
            Some(submit_payload(9)),
        ))
        .await
        .expect("bad grade");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (_, list) = get_json(&ctx, "/api/v1/chapters", &teacher).await;
    assert_eq!(list.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn other_teachers_cannot_read_job() {
    let ctx = test_support::setup_test_context().await;
    let owner = test_support::teacher_token("teacher-1", ctx.state.settings());
    let other = test_support::teacher_token("teacher-2", ctx.state.settings());
    let job_id = submit(&ctx, &owner).await;

    let (status, _) = get_json(&ctx, &format!("/api/v1/chapters/{job_id}"), &other).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get_json(&ctx, "/api/v1/chapters/missing-job", &owner).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn teachers_cannot_submit_another_teachers_document() {
    let ctx = test_support::setup_test_context().await;
    let other = test_support::teacher_token("teacher-2", ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/chapters",
            Some(&other),
            Some(submit_payload(5)),
        ))
        .await
        .expect("foreign document");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");

    let (_, list) = get_json(&ctx, "/api/v1/chapters", &other).await;
    assert_eq!(list.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn upload_url_requires_configured_storage_and_allowed_extension() {
    let ctx = test_support::setup_test_context().await;
    let token = test_support::teacher_token("teacher-1", ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/chapters/upload-url",
            Some(&token),
            Some(json!({"filename": "plants.exe"})),
        ))
        .await
        .expect("bad extension");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/chapters/upload-url",
            Some(&token),
            Some(json!({"filename": "plants.txt"})),
        ))
        .await
        .expect("no storage");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
