//! Transcript ingestion webhook
//!
//! The device posts segment batches here. The handler validates, runs the
//! activation pipeline, and answers within the response deadline; all
//! persistence is enqueued from a detached task once the response value
//! exists, never on the request's critical path.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::activation::{ActivationPattern, Decision, Segment};
use crate::completion::STILL_THINKING;
use crate::jobs::Job;
use crate::prefs::{Preferences, ResolvedPreferences};

/// Base system context for answering
const SYSTEM_PROMPT: &str = "You are Pendant, a helpful voice assistant worn by the user. \
     Answer concisely; your reply is read aloud.";

/// System context for meeting summaries
const MEETING_SYSTEM_PROMPT: &str = "You summarize meeting transcripts. \
     Reply with a few short sentences covering decisions and action items.";

/// Device hint attached to spoken replies
const SPEAK_INSTRUCTION: &str = "Speak this response to the user.";

/// Memories folded into the context when injection is enabled
const INJECTED_MEMORY_LIMIT: usize = 5;

/// Incoming webhook payload
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub uid: Option<String>,
    /// Request-level end-of-stream flag
    #[serde(default, rename = "final")]
    pub final_flag: Option<bool>,
}

/// Webhook response; all three fields are always present
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub message: String,
    pub help_response: String,
    pub instructions: String,
}

impl WebhookResponse {
    fn silent() -> Self {
        Self {
            message: String::new(),
            help_response: String::new(),
            instructions: String::new(),
        }
    }

    fn reply(text: &str) -> Self {
        Self {
            message: text.to_string(),
            help_response: text.to_string(),
            instructions: SPEAK_INSTRUCTION.to_string(),
        }
    }

    fn thinking() -> Self {
        Self::reply(STILL_THINKING)
    }
}

#[derive(Serialize)]
struct ValidationError {
    error: String,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ValidationError {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Handle an incoming segment batch
pub async fn handle(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WebhookPayload>,
) -> Response {
    // Input validation, before any state mutation
    let Some(session_key) = payload
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(ToString::to_string)
    else {
        return bad_request("session_id is required");
    };
    if payload.segments.is_empty() {
        return bad_request("segments must not be empty");
    }

    tracing::debug!(
        session = %session_key,
        segments = payload.segments.len(),
        "webhook batch received"
    );

    // Processing continues past the deadline; only the returned body changes
    let deadline = state.response_deadline;
    let work = tokio::spawn(process(state, session_key, payload));

    match tokio::time::timeout(deadline, work).await {
        Ok(Ok(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "webhook processing task failed");
            (StatusCode::OK, Json(WebhookResponse::thinking())).into_response()
        }
        Err(_) => {
            tracing::warn!("response deadline reached, returning placeholder");
            (StatusCode::OK, Json(WebhookResponse::thinking())).into_response()
        }
    }
}

async fn process(
    state: Arc<AppState>,
    session_key: String,
    payload: WebhookPayload,
) -> WebhookResponse {
    let resolved = state
        .resolver
        .resolve(&session_key, payload.uid.as_deref())
        .unwrap_or_else(|e| {
            tracing::warn!(session = %session_key, error = %e, "preference resolution failed, using defaults");
            ResolvedPreferences {
                preferences: Preferences::default(),
                pattern: ActivationPattern::default(),
                user_id: payload.uid.clone(),
                session: None,
            }
        });

    let batch_final = payload.final_flag == Some(true);
    let decision = state
        .engine
        .evaluate(&session_key, &resolved, &payload.segments, batch_final);

    let thread_id = resolved
        .session
        .as_ref()
        .and_then(|s| s.thread_ref.clone())
        .unwrap_or_else(|| "device".to_string());

    let mut exchange = None;
    let mut captured_memory = None;

    let response = match decision {
        Decision::Drop(reason) => {
            tracing::debug!(session = %session_key, ?reason, "batch dropped");
            WebhookResponse::silent()
        }
        Decision::EndOfMeeting => {
            let transcript = batch_text(&payload.segments);
            let summary = state
                .invoker
                .invoke(
                    &format!("Summarize this meeting transcript:\n\n{transcript}"),
                    MEETING_SYSTEM_PROMPT,
                )
                .await;
            exchange = Some((transcript, summary.clone()));
            WebhookResponse::reply(&summary)
        }
        Decision::Engage { question } => {
            captured_memory = remember_capture(&question);

            let context = build_context(&state, &resolved);
            let answer = state.invoker.invoke(&question, &context).await;
            exchange = Some((question, answer.clone()));
            WebhookResponse::reply(&answer)
        }
    };

    enqueue_side_effects(
        &state,
        session_key,
        resolved.user_id,
        thread_id,
        payload.segments,
        exchange,
        captured_memory,
    );

    response
}

/// System context, with recent memories folded in when enabled
fn build_context(state: &AppState, resolved: &ResolvedPreferences) -> String {
    if !resolved.preferences.inject_memories {
        return SYSTEM_PROMPT.to_string();
    }
    let Some(user_id) = resolved.user_id.as_deref() else {
        return SYSTEM_PROMPT.to_string();
    };

    match state.memories.recent_for_user(user_id, INJECTED_MEMORY_LIMIT) {
        Ok(memories) if !memories.is_empty() => {
            let facts = memories
                .iter()
                .map(|m| format!("- {}", m.content))
                .collect::<Vec<_>>()
                .join("\n");
            format!("{SYSTEM_PROMPT}\n\nThings you know about the user:\n{facts}")
        }
        Ok(_) => SYSTEM_PROMPT.to_string(),
        Err(e) => {
            tracing::warn!(user = %user_id, error = %e, "memory lookup failed");
            SYSTEM_PROMPT.to_string()
        }
    }
}

/// Persistence side effects, detached from the request path
fn enqueue_side_effects(
    state: &Arc<AppState>,
    session_key: String,
    user_id: Option<String>,
    thread_id: String,
    segments: Vec<Segment>,
    exchange: Option<(String, String)>,
    captured_memory: Option<String>,
) {
    let state = state.clone();
    tokio::spawn(async move {
        state.queue.enqueue(Job::SessionUpdate {
            session_key: session_key.clone(),
            user_id: user_id.clone(),
            thread_ref: None,
        });
        state.queue.enqueue(Job::TranscriptBatch {
            session_key: session_key.clone(),
            segments,
        });

        if let Some((question, answer)) = exchange {
            state.queue.enqueue(Job::ConversationSave {
                session_key: session_key.clone(),
                user_id: user_id.clone(),
                external_thread_id: thread_id.clone(),
                exchange_id: Uuid::new_v4().to_string(),
                question,
                answer,
            });
            if let Some(uid) = user_id.clone() {
                state.queue.enqueue(Job::ContextWindowUpdate {
                    user_id: uid,
                    session_key: session_key.clone(),
                    external_thread_id: thread_id,
                });
            }
        }

        if let (Some(uid), Some(content)) = (user_id, captured_memory) {
            state.queue.enqueue(Job::MemorySave {
                user_id: uid,
                content,
            });
        }
    });
}

fn batch_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract memory content from an explicit remember-phrase question
fn remember_capture(question: &str) -> Option<String> {
    let trimmed = question.trim();
    let lower = trimmed.to_lowercase();

    for prefix in ["remember that ", "note that ", "remember "] {
        if lower.starts_with(prefix) && trimmed.is_char_boundary(prefix.len()) {
            let content = trimmed[prefix.len()..].trim();
            if !content.is_empty() {
                return Some(content.to_string());
            }
        }
    }
    None
}
