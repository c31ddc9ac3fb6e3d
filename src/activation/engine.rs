//! Activation/dedupe state machine
//!
//! Per-session engage/suppress decisions. State lives in-process behind a
//! per-session lock: overlapping requests for the same session serialize,
//! cross-session requests never contend. The `/sessions/clear` sweep prunes
//! entries together with the session rows.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Timelike;

use super::{quiet_hours::within_quiet_hours, Segment};
use crate::prefs::{ListenMode, ResolvedPreferences};
use crate::text;

/// Cooldown within which a near-duplicate question is suppressed
const DUPLICATE_COOLDOWN: Duration = Duration::from_millis(10_000);

/// Outcome of evaluating one segment batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Invoke the assistant with the extracted question
    Engage { question: String },
    /// Meeting mode received its end signal; summarize the batch
    EndOfMeeting,
    /// No response; segments persist via the background queue regardless
    Drop(DropReason),
}

/// Why a batch produced no response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Meeting mode, end signal not seen yet
    MeetingInProgress,
    /// Quiet hours or mute suppressed engagement
    QuietHours,
    /// Listen mode did not engage for this batch
    NotEngaged,
    /// Engaged, but no question text could be derived
    EmptyQuestion,
    /// Near-duplicate of a recently accepted question
    Duplicate,
}

struct LastQuestion {
    normalized: String,
    at: Instant,
}

#[derive(Default)]
struct SessionState {
    last_question: Option<LastQuestion>,
}

/// Per-session activation state machine
#[derive(Default)]
pub struct ActivationEngine {
    states: Mutex<HashMap<String, Arc<Mutex<SessionState>>>>,
}

impl ActivationEngine {
    /// Create an engine with no session state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a batch for a session at the current wall clock
    pub fn evaluate(
        &self,
        session_key: &str,
        resolved: &ResolvedPreferences,
        segments: &[Segment],
        batch_final: bool,
    ) -> Decision {
        let local = chrono::Local::now();
        #[allow(clippy::cast_possible_truncation)]
        let now_minutes = (local.time().hour() * 60 + local.time().minute()) as u16;
        self.evaluate_at(
            session_key,
            resolved,
            segments,
            batch_final,
            Instant::now(),
            now_minutes,
        )
    }

    /// Evaluate with an explicit clock; the unit under test
    pub(crate) fn evaluate_at(
        &self,
        session_key: &str,
        resolved: &ResolvedPreferences,
        segments: &[Segment],
        batch_final: bool,
        now: Instant,
        now_minutes: u16,
    ) -> Decision {
        let prefs = &resolved.preferences;

        if prefs.meeting_transcribe {
            let ended = batch_final || segments.iter().any(Segment::is_end_of_speech);
            return if ended {
                Decision::EndOfMeeting
            } else {
                Decision::Drop(DropReason::MeetingInProgress)
            };
        }

        if within_quiet_hours(prefs, now_minutes) {
            return Decision::Drop(DropReason::QuietHours);
        }

        let state_handle = self.state_for(session_key);
        let mut state = state_handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let activation = resolved.pattern.find_activation(segments);

        let question = match prefs.listen_mode {
            ListenMode::Trigger => match activation {
                Some(a) => a.question,
                None => return Decision::Drop(DropReason::NotEngaged),
            },
            ListenMode::Followup => {
                if let Some(a) = activation {
                    a.question
                } else if state.last_question.as_ref().is_some_and(|last| {
                    now.duration_since(last.at)
                        <= Duration::from_millis(prefs.followup_window_ms)
                }) {
                    joined_text(segments)
                } else {
                    return Decision::Drop(DropReason::NotEngaged);
                }
            }
            ListenMode::Always => {
                activation.map_or_else(|| joined_text(segments), |a| a.question)
            }
        };

        let question = question.trim().to_string();
        if question.is_empty() {
            return Decision::Drop(DropReason::EmptyQuestion);
        }

        let normalized = text::normalize(&question);
        if let Some(last) = &state.last_question {
            if now.duration_since(last.at) <= DUPLICATE_COOLDOWN
                && text::is_near_duplicate(&last.normalized, &normalized)
            {
                tracing::debug!(session = %session_key, "duplicate question suppressed");
                return Decision::Drop(DropReason::Duplicate);
            }
        }

        state.last_question = Some(LastQuestion {
            normalized,
            at: now,
        });

        Decision::Engage { question }
    }

    /// Drop state for a swept session key
    pub fn remove_session(&self, session_key: &str) {
        self.states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(session_key);
    }

    /// Number of sessions with tracked state
    pub fn session_count(&self) -> usize {
        self.states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn state_for(&self, session_key: &str) -> Arc<Mutex<SessionState>> {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        states
            .entry(session_key.to_string())
            .or_default()
            .clone()
    }
}

/// Batch text for engagements without a wake phrase
fn joined_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
