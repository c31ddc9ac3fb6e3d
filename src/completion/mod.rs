//! Completion service client and degrade-gracefully invoker
//!
//! The invoker guarantees the webhook always has text to return: the primary
//! call is raced against a hard budget, any other failure gets exactly one
//! cheaper fallback attempt, and both failing yields a fixed apology.

pub mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpCompletionService;

/// Placeholder returned when a call exceeds its time budget
pub const STILL_THINKING: &str =
    "I'm still thinking about that one. Give me a moment and ask me again.";

/// Apology returned when both tiers fail
pub const APOLOGY: &str = "Sorry, I couldn't come up with an answer just now. Please try again.";

/// Reduced context used for the fallback tier
const FALLBACK_SYSTEM_PROMPT: &str =
    "You are a helpful voice assistant. Answer briefly in one or two sentences.";

/// Completion service failure modes
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The service reported a timeout
    #[error("completion timed out")]
    Timeout,

    /// Any other service failure
    #[error("completion service error: {0}")]
    Service(String),
}

/// One completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_text: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Client-side budget for the call
    pub timeout: Duration,
}

/// Black-box completion service
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Issue one completion call
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::Timeout`] for timeout-specific failures,
    /// [`CompletionError::Service`] for everything else.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// Invoker tuning
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    pub primary_model: String,
    pub fallback_model: String,
    /// Primary call budget
    pub primary_timeout: Duration,
    /// Fallback call budget
    pub fallback_timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            primary_model: "gpt-4o".to_string(),
            fallback_model: "gpt-4o-mini".to_string(),
            primary_timeout: Duration::from_secs(10),
            fallback_timeout: Duration::from_secs(5),
            max_tokens: 512,
            temperature: 0.7,
        }
    }
}

/// Two-tier completion invoker
pub struct Invoker {
    service: Arc<dyn CompletionService>,
    config: InvokerConfig,
}

impl Invoker {
    /// Create an invoker over a completion service
    #[must_use]
    pub fn new(service: Arc<dyn CompletionService>, config: InvokerConfig) -> Self {
        Self { service, config }
    }

    /// Answer a question, always returning some text
    ///
    /// Budget overrun returns the "still thinking" placeholder; the in-flight
    /// call is only raced against locally, not cancelled server-side. Other
    /// failures get one fallback attempt with a reduced context before the
    /// apology string.
    pub async fn invoke(&self, question: &str, system_context: &str) -> String {
        let request = CompletionRequest {
            model: self.config.primary_model.clone(),
            system_prompt: system_context.to_string(),
            user_text: question.to_string(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            timeout: self.config.primary_timeout,
        };

        match tokio::time::timeout(self.config.primary_timeout, self.service.complete(&request))
            .await
        {
            Ok(Ok(text)) => text,
            Err(_) | Ok(Err(CompletionError::Timeout)) => {
                tracing::warn!(model = %self.config.primary_model, "completion timed out");
                STILL_THINKING.to_string()
            }
            Ok(Err(CompletionError::Service(e))) => {
                tracing::warn!(model = %self.config.primary_model, error = %e, "completion failed, trying fallback");
                self.fallback(question).await
            }
        }
    }

    async fn fallback(&self, question: &str) -> String {
        let request = CompletionRequest {
            model: self.config.fallback_model.clone(),
            system_prompt: FALLBACK_SYSTEM_PROMPT.to_string(),
            user_text: question.to_string(),
            max_tokens: self.config.max_tokens.min(256),
            temperature: self.config.temperature,
            timeout: self.config.fallback_timeout,
        };

        match tokio::time::timeout(self.config.fallback_timeout, self.service.complete(&request))
            .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::error!(model = %self.config.fallback_model, error = %e, "fallback completion failed");
                APOLOGY.to_string()
            }
            Err(_) => {
                tracing::error!(model = %self.config.fallback_model, "fallback completion timed out");
                APOLOGY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted service: each call pops the next behavior
    struct ScriptedService {
        calls: AtomicUsize,
        script: Vec<ScriptStep>,
    }

    enum ScriptStep {
        Reply(&'static str),
        Fail(&'static str),
        ReportTimeout,
        Hang(Duration),
    }

    #[async_trait]
    impl CompletionService for ScriptedService {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<String, CompletionError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.get(index) {
                Some(ScriptStep::Reply(text)) => Ok((*text).to_string()),
                Some(ScriptStep::Fail(message)) => {
                    Err(CompletionError::Service((*message).to_string()))
                }
                Some(ScriptStep::ReportTimeout) => Err(CompletionError::Timeout),
                Some(ScriptStep::Hang(duration)) => {
                    tokio::time::sleep(*duration).await;
                    Ok("too late".to_string())
                }
                None => panic!("unexpected completion call"),
            }
        }
    }

    fn invoker(script: Vec<ScriptStep>) -> (Invoker, Arc<ScriptedService>) {
        let service = Arc::new(ScriptedService {
            calls: AtomicUsize::new(0),
            script,
        });
        let invoker = Invoker::new(service.clone(), InvokerConfig::default());
        (invoker, service)
    }

    #[tokio::test]
    async fn primary_success_returns_reply() {
        let (invoker, service) = invoker(vec![ScriptStep::Reply("It is noon.")]);

        let text = invoker.invoke("what time is it", "ctx").await;
        assert_eq!(text, "It is noon.");
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn primary_overrun_returns_placeholder_without_fallback() {
        let (invoker, service) = invoker(vec![ScriptStep::Hang(Duration::from_secs(30))]);

        let text = invoker.invoke("slow question", "ctx").await;
        assert_eq!(text, STILL_THINKING);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn service_reported_timeout_returns_placeholder() {
        let (invoker, service) = invoker(vec![ScriptStep::ReportTimeout]);

        let text = invoker.invoke("question", "ctx").await;
        assert_eq!(text, STILL_THINKING);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_falls_back_once() {
        let (invoker, service) = invoker(vec![
            ScriptStep::Fail("overloaded"),
            ScriptStep::Reply("short answer"),
        ]);

        let text = invoker.invoke("question", "ctx").await;
        assert_eq!(text, "short answer");
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn double_failure_returns_apology() {
        let (invoker, service) = invoker(vec![
            ScriptStep::Fail("overloaded"),
            ScriptStep::Fail("still overloaded"),
        ]);

        let text = invoker.invoke("question", "ctx").await;
        assert_eq!(text, APOLOGY);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_overrun_returns_apology() {
        let (invoker, service) = invoker(vec![
            ScriptStep::Fail("overloaded"),
            ScriptStep::Hang(Duration::from_secs(30)),
        ]);

        let text = invoker.invoke("question", "ctx").await;
        assert_eq!(text, APOLOGY);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }
}
