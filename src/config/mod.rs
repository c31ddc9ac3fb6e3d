//! Configuration management for the Pendant gateway
//!
//! Layered: hardcoded defaults, then the optional TOML file, then
//! environment variables. CLI flags override the port at startup.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::completion::InvokerConfig;
use crate::jobs::QueueConfig;
use crate::{Error, Result};

/// Pendant gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database lives here)
    pub data_dir: PathBuf,

    /// API server port
    pub port: u16,

    /// Overall webhook response deadline
    pub response_deadline: Duration,

    /// Completion service endpoint
    pub completion: CompletionConfig,

    /// Completion invoker tuning
    pub invoker: InvokerConfig,

    /// Background queue tuning
    pub queue: QueueConfig,
}

/// Completion service endpoint configuration
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// OpenAI-compatible API base URL
    pub base_url: String,

    /// Bearer token, if the endpoint needs one
    pub api_key: Option<String>,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns error if no data directory can be determined
    pub fn load() -> Result<Self> {
        let file = file::load_config_file();

        let data_dir = std::env::var("PENDANT_DATA_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| file.server.data_dir.as_ref().map(PathBuf::from))
            .or_else(|| {
                directories::ProjectDirs::from("dev", "pendant", "pendant")
                    .map(|dirs| dirs.data_dir().to_path_buf())
            })
            .ok_or_else(|| Error::Config("could not determine data directory".to_string()))?;

        let port = file.server.port.unwrap_or(8080);

        let response_deadline =
            Duration::from_millis(file.server.response_deadline_ms.unwrap_or(12_000));

        let completion = CompletionConfig {
            base_url: std::env::var("PENDANT_COMPLETION_URL")
                .ok()
                .or(file.completion.base_url)
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("PENDANT_COMPLETION_API_KEY")
                .ok()
                .or(file.completion.api_key),
        };

        let mut invoker = InvokerConfig::default();
        if let Some(model) = std::env::var("PENDANT_COMPLETION_MODEL")
            .ok()
            .or(file.completion.model)
        {
            invoker.primary_model = model;
        }
        if let Some(model) = std::env::var("PENDANT_COMPLETION_FALLBACK_MODEL")
            .ok()
            .or(file.completion.fallback_model)
        {
            invoker.fallback_model = model;
        }
        if let Some(max_tokens) = file.completion.max_tokens {
            invoker.max_tokens = max_tokens;
        }
        if let Some(temperature) = file.completion.temperature {
            invoker.temperature = temperature;
        }

        let mut queue = QueueConfig::default();
        if let Some(interval) = file.queue.processing_interval_ms {
            queue.processing_interval = Duration::from_millis(interval);
        }
        if let Some(batch_size) = file.queue.batch_size {
            queue.batch_size = batch_size;
        }
        if let Some(max_concurrent) = file.queue.max_concurrent_jobs {
            queue.max_concurrent_jobs = max_concurrent;
        }
        if let Some(max_retries) = file.queue.max_retries {
            queue.max_retries = max_retries;
        }

        Ok(Self {
            data_dir,
            port,
            response_deadline,
            completion,
            invoker,
            queue,
        })
    }
}
