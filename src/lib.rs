//! Pendant Gateway - Companion backend for wearable voice assistants
//!
//! This library provides the core functionality for the Pendant gateway:
//! - Transcript ingestion webhook with a hard response deadline
//! - Per-session activation detection (listen modes, quiet hours, dedupe)
//! - Two-tier completion invocation with graceful degradation
//! - In-memory background job queue for asynchronous persistence
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Wearable Device                      │
//! │        transcript segments via POST /webhook         │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Pendant Gateway                       │
//! │  Activation  │  Preferences  │  Invoker  │  Queue   │
//! └──────┬──────────────────────────────────────┬───────┘
//!        │                                      │
//! ┌──────▼───────────────┐          ┌───────────▼───────┐
//! │  Completion Service   │          │  SQLite Storage   │
//! │  (OpenAI-compatible)  │          │  (async via jobs) │
//! └───────────────────────┘          └───────────────────┘
//! ```

pub mod activation;
pub mod api;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod prefs;
pub mod text;

pub use activation::{ActivationEngine, ActivationPattern, Decision, DropReason, Segment};
pub use completion::{CompletionService, HttpCompletionService, Invoker, InvokerConfig};
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use jobs::{Job, JobExecutor, JobQueue, QueueConfig, QueueStatus};
pub use prefs::{ListenMode, PreferenceRecord, PreferenceResolver, Preferences};
