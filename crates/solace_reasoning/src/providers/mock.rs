//! Mock provider: deterministic responses for running without an API key.

use tokio::sync::mpsc;

use solace_core::ChatMessage;

use crate::llm::{CompletionError, CompletionParams, LlmClient, StreamEvent};

const MOCK_REPLY: &str = "I hear how much this is carrying for you right now. \
It makes sense that it feels heavy, and you do not have to sort all of it \
tonight. What part of it feels closest to the surface?";

#[derive(Debug, Clone, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl LlmClient for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: Vec<ChatMessage>,
        _params: CompletionParams,
    ) -> Result<String, CompletionError> {
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
        Ok(MOCK_REPLY.to_string())
    }

    async fn stream_complete(
        &self,
        _system: &str,
        _messages: Vec<ChatMessage>,
        _params: CompletionParams,
    ) -> Result<mpsc::Receiver<StreamEvent>, CompletionError> {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            // A few word-sized chunks so callers exercise real streaming.
            for chunk in MOCK_REPLY.split_inclusive(' ') {
                if tx.send(StreamEvent::TextDelta(chunk.to_string())).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(StreamEvent::Done).await;
        });
        Ok(rx)
    }
}
