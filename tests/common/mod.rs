//! Shared test utilities

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pendant_gateway::api::AppState;
use pendant_gateway::completion::{
    CompletionError, CompletionRequest, CompletionService, Invoker, InvokerConfig,
};
use pendant_gateway::jobs::{JobExecutor, JobQueue, QueueConfig};
use pendant_gateway::{db, DbPool};

/// Completion stub that answers instantly with a fixed reply
pub struct CannedCompletion(pub &'static str);

#[async_trait]
impl CompletionService for CannedCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
        Ok(self.0.to_string())
    }
}

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Build app state over an in-memory database and a canned completion
#[must_use]
pub fn build_test_state(db: DbPool, reply: &'static str) -> Arc<AppState> {
    let invoker = Invoker::new(Arc::new(CannedCompletion(reply)), InvokerConfig::default());
    let executor = Arc::new(JobExecutor::new(&db));
    let queue = JobQueue::new(executor, QueueConfig::default());
    Arc::new(AppState::new(db, invoker, queue, Duration::from_secs(12)))
}

/// Build a test API router over prebuilt state
#[must_use]
pub fn build_test_router(state: Arc<AppState>) -> axum::Router {
    pendant_gateway::api::router(state)
}
