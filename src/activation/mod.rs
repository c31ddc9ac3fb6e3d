//! Activation pipeline
//!
//! Decides, per incoming transcript batch and per session, whether the
//! assistant should engage: wake-phrase matching, listen-mode gating,
//! quiet-hours suppression, and duplicate-question cooldown.

pub mod engine;
pub mod matcher;
pub mod quiet_hours;

use serde::{Deserialize, Serialize};

pub use engine::{ActivationEngine, Decision, DropReason};
pub use matcher::{Activation, ActivationPattern};
pub use quiet_hours::within_quiet_hours;

/// One transcribed utterance span from the device
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Segment {
    /// Transcript text
    pub text: String,

    /// External segment id (idempotency key together with the session)
    #[serde(default)]
    pub id: Option<String>,

    /// Alternate id field some firmware versions send
    #[serde(default)]
    pub segment_id: Option<String>,

    /// Speaker label (e.g. "SPEAKER_00")
    #[serde(default)]
    pub speaker: Option<String>,

    /// Numeric speaker id
    #[serde(default)]
    pub speaker_id: Option<i64>,

    /// Whether the wearer is speaking
    #[serde(default)]
    pub is_user: Option<bool>,

    /// Start offset in seconds from stream start
    #[serde(default)]
    pub start: Option<f64>,

    /// End offset in seconds from stream start
    #[serde(default)]
    pub end: Option<f64>,

    /// End-of-speech marker
    #[serde(default, rename = "final")]
    pub final_marker: Option<bool>,

    /// End-of-speech marker (alternate field name)
    #[serde(default)]
    pub is_final: Option<bool>,

    /// Last-segment marker
    #[serde(default)]
    pub is_last_segment: Option<bool>,

    /// Segment type tag ("start", "speech", "end")
    #[serde(default)]
    pub segment_type: Option<String>,
}

impl Segment {
    /// External id for upsert keying, whichever field the firmware populated
    #[must_use]
    pub fn external_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.segment_id.as_deref())
    }

    /// Whether this segment signals the end of an utterance or meeting
    #[must_use]
    pub fn is_end_of_speech(&self) -> bool {
        self.final_marker == Some(true)
            || self.is_final == Some(true)
            || self.is_last_segment == Some(true)
            || self.segment_type.as_deref() == Some("end")
    }
}

/// Convenience constructor used throughout the activation tests
#[cfg(test)]
pub(crate) fn text_segment(text: &str) -> Segment {
    Segment {
        text: text.to_string(),
        ..Segment::default()
    }
}
