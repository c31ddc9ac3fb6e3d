//! Webhook endpoint integration tests

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pendant_gateway::api::AppState;
use pendant_gateway::db::{ConversationRepo, SessionRepo, TranscriptRepo};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::{build_test_router, build_test_state, setup_test_db};

fn webhook_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn post_webhook(state: &Arc<AppState>, body: &Value) -> (StatusCode, Value) {
    let app = build_test_router(state.clone());
    let response = app.oneshot(webhook_request(body)).await.unwrap();
    let status = response.status();
    (status, response_json(response).await)
}

/// Give the detached enqueue task a chance to run, then drain the queue
async fn settle_jobs(state: &Arc<AppState>) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    state.queue.drain_now().await;
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let state = build_test_state(setup_test_db(), "reply");
    let app = build_test_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn missing_session_id_is_rejected() {
    let state = build_test_state(setup_test_db(), "reply");

    let (status, json) = post_webhook(
        &state,
        &json!({"segments": [{"text": "hey pendant hello"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn empty_segments_are_rejected() {
    let state = build_test_state(setup_test_db(), "reply");

    let (status, _) = post_webhook(&state, &json!({"session_id": "dev-1", "segments": []})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unmatched_batch_returns_silent_response_with_all_fields() {
    let state = build_test_state(setup_test_db(), "reply");

    let (status, json) = post_webhook(
        &state,
        &json!({
            "session_id": "dev-1",
            "segments": [{"text": "the weather is nice today"}]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // All three fields always present, empty on suppressed paths
    assert_eq!(json["message"], "");
    assert_eq!(json["help_response"], "");
    assert_eq!(json["instructions"], "");
}

#[tokio::test]
async fn triggered_batch_returns_the_completion_reply() {
    let state = build_test_state(setup_test_db(), "It is noon.");

    let (status, json) = post_webhook(
        &state,
        &json!({
            "session_id": "dev-1",
            "segments": [{"text": "hey pendant what time is it", "id": "seg-1"}]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "It is noon.");
    assert_eq!(json["help_response"], "It is noon.");
    assert_ne!(json["instructions"], "");
}

#[tokio::test]
async fn triggered_batch_persists_through_the_queue() {
    let db = setup_test_db();
    let state = build_test_state(db.clone(), "It is noon.");

    post_webhook(
        &state,
        &json!({
            "session_id": "dev-1",
            "uid": "user-1",
            "segments": [{"text": "hey pendant what time is it", "id": "seg-1"}]
        }),
    )
    .await;
    settle_jobs(&state).await;

    // Session row created lazily and linked to the uid
    let session = SessionRepo::new(db.clone())
        .find_by_key("dev-1")
        .unwrap()
        .expect("session row should exist");
    assert_eq!(session.user_id.as_deref(), Some("user-1"));

    // Segments persisted
    let segments = TranscriptRepo::new(db.clone())
        .list_for_session(&session.id)
        .unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].external_id, "seg-1");

    // Conversation holds the question/answer exchange
    let conversations = ConversationRepo::new(db);
    let conversation = conversations.upsert(&session.id, "device", None).unwrap();
    let messages = conversations.get_messages(&conversation.id, 10).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "what time is it");
    assert_eq!(messages[1].content, "It is noon.");
}

#[tokio::test]
async fn suppressed_batch_still_persists_segments() {
    let db = setup_test_db();
    let state = build_test_state(db.clone(), "reply");

    post_webhook(
        &state,
        &json!({
            "session_id": "dev-1",
            "segments": [{"text": "no wake phrase here", "id": "seg-1"}]
        }),
    )
    .await;
    settle_jobs(&state).await;

    let session = SessionRepo::new(db.clone())
        .find_by_key("dev-1")
        .unwrap()
        .expect("session row should exist");
    let segments = TranscriptRepo::new(db)
        .list_for_session(&session.id)
        .unwrap();
    assert_eq!(segments.len(), 1);
}

#[tokio::test]
async fn repeated_question_within_cooldown_is_suppressed() {
    let state = build_test_state(setup_test_db(), "It is noon.");

    let (_, first) = post_webhook(
        &state,
        &json!({
            "session_id": "dev-1",
            "segments": [{"text": "hey pendant what is the time"}]
        }),
    )
    .await;
    assert_eq!(first["message"], "It is noon.");

    let (status, second) = post_webhook(
        &state,
        &json!({
            "session_id": "dev-1",
            "segments": [{"text": "hey pendant what is the time?"}]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["message"], "");
}

#[tokio::test]
async fn queue_status_reports_pending_jobs() {
    let state = build_test_state(setup_test_db(), "reply");

    post_webhook(
        &state,
        &json!({
            "session_id": "dev-1",
            "segments": [{"text": "background chatter"}]
        }),
    )
    .await;
    // Let the detached enqueue task run, but do not drain
    tokio::time::sleep(Duration::from_millis(50)).await;

    let app = build_test_router(state);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/queue/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["queue_length"], 2);
    assert_eq!(json["processing"], false);
    assert_eq!(json["batch_size"], 50);
    assert_eq!(json["max_concurrent_jobs"], 10);
    assert_eq!(json["retry_queue_size"], 0);
    assert_eq!(json["job_type_counts"]["session_update"], 1);
    assert_eq!(json["job_type_counts"]["transcript_batch"], 1);
}

#[tokio::test]
async fn session_sweep_clears_idle_sessions_and_state() {
    let db = setup_test_db();
    let state = build_test_state(db.clone(), "It is noon.");

    post_webhook(
        &state,
        &json!({
            "session_id": "dev-1",
            "segments": [{"text": "hey pendant what is the time"}]
        }),
    )
    .await;
    settle_jobs(&state).await;
    assert!(SessionRepo::new(db.clone())
        .find_by_key("dev-1")
        .unwrap()
        .is_some());

    let app = build_test_router(state.clone());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions/clear")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({"max_idle_hours": 0})).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["cleared"], 1);
    assert!(SessionRepo::new(db).find_by_key("dev-1").unwrap().is_none());

    // Activation state was pruned with the session: the question repeats
    // without tripping the duplicate cooldown
    let (_, again) = post_webhook(
        &state,
        &json!({
            "session_id": "dev-1",
            "segments": [{"text": "hey pendant what is the time"}]
        }),
    )
    .await;
    assert_eq!(again["message"], "It is noon.");
}

#[tokio::test]
async fn meeting_mode_stays_silent_until_the_end_signal() {
    let db = setup_test_db();
    let state = build_test_state(db.clone(), "Summary: roadmap agreed.");

    pendant_gateway::db::PreferenceRepo::new(db)
        .upsert(
            pendant_gateway::db::PrefScope::Session,
            "dev-1",
            &pendant_gateway::PreferenceRecord {
                meeting_transcribe: Some(true),
                ..pendant_gateway::PreferenceRecord::default()
            },
        )
        .unwrap();

    let (_, mid) = post_webhook(
        &state,
        &json!({
            "session_id": "dev-1",
            "segments": [{"text": "discussing the roadmap"}]
        }),
    )
    .await;
    assert_eq!(mid["message"], "");

    let (_, end) = post_webhook(
        &state,
        &json!({
            "session_id": "dev-1",
            "segments": [{"text": "that's a wrap", "is_final": true}]
        }),
    )
    .await;
    assert_eq!(end["message"], "Summary: roadmap agreed.");
}
