//! TOML configuration file loading
//!
//! Supports `~/.config/pendant/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct PendantConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Completion service configuration
    #[serde(default)]
    pub completion: CompletionFileConfig,

    /// Background queue tuning
    #[serde(default)]
    pub queue: QueueFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Data directory override (database lives here)
    pub data_dir: Option<String>,

    /// Overall webhook response deadline in milliseconds
    pub response_deadline_ms: Option<u64>,
}

/// Completion service configuration
#[derive(Debug, Default, Deserialize)]
pub struct CompletionFileConfig {
    /// API base URL (OpenAI-compatible)
    pub base_url: Option<String>,

    /// API key; the `PENDANT_COMPLETION_API_KEY` env var takes precedence
    pub api_key: Option<String>,

    /// Primary model identifier
    pub model: Option<String>,

    /// Fallback model identifier
    pub fallback_model: Option<String>,

    /// Max completion tokens
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    pub temperature: Option<f64>,
}

/// Background queue tuning
#[derive(Debug, Default, Deserialize)]
pub struct QueueFileConfig {
    /// Drain tick interval in milliseconds
    pub processing_interval_ms: Option<u64>,

    /// Jobs drained per tick
    pub batch_size: Option<usize>,

    /// Jobs running concurrently within a batch
    pub max_concurrent_jobs: Option<usize>,

    /// Retries before a job is dropped
    pub max_retries: Option<u32>,
}

/// Load the TOML config file from the standard path
///
/// Returns `PendantConfigFile::default()` if the file doesn't exist or can't
/// be parsed (a parse failure is logged, never fatal).
#[must_use]
pub fn load_config_file() -> PendantConfigFile {
    let Some(path) = config_file_path() else {
        return PendantConfigFile::default();
    };

    if !path.exists() {
        return PendantConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(parsed) => {
                tracing::debug!(path = %path.display(), "loaded config file");
                parsed
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config file parse failed, using defaults");
                PendantConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "config file read failed, using defaults");
            PendantConfigFile::default()
        }
    }
}

/// Standard config file location
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "pendant", "pendant")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
