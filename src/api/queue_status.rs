//! Queue observability endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use super::AppState;
use crate::jobs::QueueStatus;

/// Snapshot of the background queue
pub async fn status(State(state): State<Arc<AppState>>) -> Json<QueueStatus> {
    Json(state.queue.status())
}
