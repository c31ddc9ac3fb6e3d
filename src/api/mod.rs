//! HTTP API server for the Pendant gateway

pub mod health;
pub mod queue_status;
pub mod sessions;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::activation::ActivationEngine;
use crate::completion::Invoker;
use crate::db::{DbPool, MemoryRepo, PreferenceRepo, SessionRepo};
use crate::jobs::JobQueue;
use crate::prefs::PreferenceResolver;
use crate::Result;

/// Shared state for API handlers
///
/// Constructed once at process start; all mutable state (activation state,
/// resolver cache, job queue) lives behind handles in here, never in
/// module-level globals.
pub struct AppState {
    pub db: DbPool,
    pub resolver: PreferenceResolver,
    pub engine: ActivationEngine,
    pub invoker: Invoker,
    pub queue: JobQueue,
    pub sessions: SessionRepo,
    pub memories: MemoryRepo,
    /// Overall webhook response deadline
    pub response_deadline: Duration,
}

impl AppState {
    /// Assemble state over a database pool and prebuilt invoker/queue
    #[must_use]
    pub fn new(
        db: DbPool,
        invoker: Invoker,
        queue: JobQueue,
        response_deadline: Duration,
    ) -> Self {
        let sessions = SessionRepo::new(db.clone());
        let resolver =
            PreferenceResolver::new(sessions.clone(), PreferenceRepo::new(db.clone()));
        let memories = MemoryRepo::new(db.clone());

        Self {
            db,
            resolver,
            engine: ActivationEngine::new(),
            invoker,
            queue,
            sessions,
            memories,
            response_deadline,
        }
    }
}

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook::handle))
        .route("/queue/status", get(queue_status::status))
        .route("/sessions/clear", post(sessions::clear))
        .route("/ready", get(health::ready))
        .with_state(state)
        .merge(health::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Bind and serve the API until the process exits
///
/// # Errors
///
/// Returns error if the listener cannot bind or the server fails
pub async fn serve(state: Arc<AppState>, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "api server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
