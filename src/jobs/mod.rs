//! Background job queue
//!
//! Request-path side effects become fire-and-forget jobs: enqueue returns
//! immediately, a ticker drains batches with bounded parallelism, failures
//! retry with exponential backoff. Jobs are in-memory only; a process
//! restart loses the pending queue and retry counters.

pub mod handlers;
pub mod queue;

use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::activation::Segment;

pub use handlers::JobExecutor;
pub use queue::{ExecuteJob, JobQueue, QueueConfig, QueueStatus};

/// A background unit of work
///
/// Every variant's handler is an idempotent upsert; retries can redeliver.
#[derive(Debug, Clone)]
pub enum Job {
    /// Upsert the session row and touch its last-seen timestamp
    SessionUpdate {
        session_key: String,
        user_id: Option<String>,
        thread_ref: Option<String>,
    },
    /// Upsert a batch of transcript segments
    TranscriptBatch {
        session_key: String,
        segments: Vec<Segment>,
    },
    /// Upsert the conversation thread and append one exchange
    ConversationSave {
        session_key: String,
        user_id: Option<String>,
        external_thread_id: String,
        /// Generated once at enqueue time; redelivery reuses it, which keys
        /// the message rows and keeps the handler idempotent
        exchange_id: String,
        question: String,
        answer: String,
    },
    /// Create a memory unless an identical one exists within the dedupe window
    MemorySave { user_id: String, content: String },
    /// Point the user's context window at the conversation thread
    ContextWindowUpdate {
        user_id: String,
        session_key: String,
        external_thread_id: String,
    },
}

impl Job {
    /// Job type tag for logs and the status endpoint
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session_update",
            Self::TranscriptBatch { .. } => "transcript_batch",
            Self::ConversationSave { .. } => "conversation_save",
            Self::MemorySave { .. } => "memory_save",
            Self::ContextWindowUpdate { .. } => "context_window_update",
        }
    }
}

/// An enqueued job with its process-local bookkeeping
#[derive(Debug, Clone)]
pub struct JobEnvelope {
    pub id: Uuid,
    pub job: Job,
    pub enqueued_at: Instant,
    pub retry_count: u32,
}

impl JobEnvelope {
    pub(crate) fn new(job: Job) -> Self {
        Self {
            id: Uuid::new_v4(),
            job,
            enqueued_at: Instant::now(),
            retry_count: 0,
        }
    }
}

/// Backoff before a retry attempt: `min(30s, 1s * 2^retry_count)`
#[must_use]
pub fn backoff_delay(retry_count: u32) -> Duration {
    let millis = 1000u64.saturating_mul(2u64.saturating_pow(retry_count));
    Duration::from_millis(millis.min(30_000))
}
