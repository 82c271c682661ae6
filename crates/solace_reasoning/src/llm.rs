//! Completion gateway contract.
//!
//! One blocking call and one streaming call, both taking a system
//! instruction plus a message list. Failures are typed so the turn pipeline
//! can map rate limits and quota exhaustion to distinct user-facing messages.

use async_trait::async_trait;
use thiserror::Error;

use solace_core::ChatMessage;

/// Parameters for one completion request.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

/// Incremental output of a streaming completion. The stream is finite and
/// single-consumer; `Done` is the terminal sentinel on the happy path.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta(String),
    Done,
    Error(String),
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion gateway rate limited the request")]
    RateLimited,
    #[error("completion gateway quota exhausted")]
    QuotaExhausted,
    #[error("completion gateway error {status}: {detail}")]
    Api { status: u16, detail: String },
    #[error("completion gateway request failed: {0}")]
    Network(String),
    #[error("completion gateway returned a malformed body: {0}")]
    Malformed(String),
}

impl CompletionError {
    /// Map an HTTP status to the classified error, keeping the raw status
    /// for everything that is not a rate-limit or quota condition.
    pub fn from_status(status: u16, detail: String) -> Self {
        match status {
            429 => CompletionError::RateLimited,
            402 => CompletionError::QuotaExhausted,
            _ => CompletionError::Api { status, detail },
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Blocking completion: resolves to the full generated text.
    async fn complete(
        &self,
        system: &str,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<String, CompletionError>;

    /// Streaming completion: resolves to a channel of incremental chunks
    /// once the request is accepted. Errors before the first byte are
    /// returned directly; mid-stream failures arrive as `StreamEvent::Error`.
    async fn stream_complete(
        &self,
        system: &str,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>, CompletionError>;
}
