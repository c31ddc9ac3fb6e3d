//! Background queue integration tests

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use pendant_gateway::db::MemoryRepo;
use pendant_gateway::jobs::{Job, JobExecutor, JobQueue, QueueConfig};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{build_test_router, build_test_state, setup_test_db};

#[tokio::test]
async fn duplicate_memory_saves_persist_one_row() {
    let db = setup_test_db();
    let executor = Arc::new(JobExecutor::new(&db));
    let queue = JobQueue::new(executor, QueueConfig::default());

    let job = Job::MemorySave {
        user_id: "user-1".to_string(),
        content: "parked on level 3".to_string(),
    };
    queue.enqueue(job.clone());
    queue.enqueue(job);
    queue.drain_now().await;

    let memories = MemoryRepo::new(db).recent_for_user("user-1", 10).unwrap();
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0].content, "parked on level 3");
}

#[tokio::test]
async fn drain_loop_processes_enqueued_jobs() {
    let db = setup_test_db();
    let executor = Arc::new(JobExecutor::new(&db));
    let queue = JobQueue::new(executor, QueueConfig::default());
    let drain = queue.spawn_drain_loop();

    queue.enqueue(Job::MemorySave {
        user_id: "user-1".to_string(),
        content: "likes early meetings".to_string(),
    });

    // The 50ms ticker should pick the job up promptly
    let mut persisted = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if !MemoryRepo::new(db.clone())
            .recent_for_user("user-1", 10)
            .unwrap()
            .is_empty()
        {
            persisted = true;
            break;
        }
    }
    drain.abort();

    assert!(persisted, "job was not processed by the drain loop");
    assert!(queue.is_empty());
}

#[tokio::test]
async fn remember_phrase_flows_into_a_memory_row() {
    let db = setup_test_db();
    let state = build_test_state(db.clone(), "Noted.");

    let app = build_test_router(state.clone());
    let response = app
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/webhook")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&json!({
                        "session_id": "dev-1",
                        "uid": "user-1",
                        "segments": [{"text": "hey pendant remember that I parked on level 3"}]
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Let the detached enqueue task run, then drain
    tokio::time::sleep(Duration::from_millis(50)).await;
    state.queue.drain_now().await;

    let memories = MemoryRepo::new(db).recent_for_user("user-1", 10).unwrap();
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0].content, "I parked on level 3");
}
