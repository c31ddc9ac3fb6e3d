//! Session maintenance endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;

/// Default inactivity horizon for the sweep
const DEFAULT_MAX_IDLE_HOURS: i64 = 24;

/// Sweep request
#[derive(Debug, Default, Deserialize)]
pub struct ClearRequest {
    /// Sessions idle longer than this many hours are expired
    #[serde(default)]
    pub max_idle_hours: Option<i64>,
}

/// Sweep result
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

/// Expire inactive sessions and prune their process-local state
pub async fn clear(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClearRequest>,
) -> (StatusCode, Json<ClearResponse>) {
    let hours = request.max_idle_hours.unwrap_or(DEFAULT_MAX_IDLE_HOURS).max(0);
    let cutoff = Utc::now() - Duration::hours(hours);

    match state.sessions.sweep_inactive(cutoff) {
        Ok(keys) => {
            for key in &keys {
                state.engine.remove_session(key);
                state.resolver.invalidate(key);
            }
            tracing::info!(cleared = keys.len(), max_idle_hours = hours, "session sweep complete");
            (StatusCode::OK, Json(ClearResponse { cleared: keys.len() }))
        }
        Err(e) => {
            tracing::error!(error = %e, "session sweep failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ClearResponse { cleared: 0 }),
            )
        }
    }
}
