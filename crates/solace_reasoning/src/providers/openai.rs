//! OpenAI-compatible completion gateway provider.
//!
//! Speaks the `/chat/completions` wire format, blocking and SSE-streaming.
//! Blocking calls go through the retry wrapper; streaming requests are
//! single-attempt since a stream cannot be transparently re-issued once
//! chunks may have been consumed.

use std::env;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use solace_core::config::LlmConfig;
use solace_core::{ChatMessage, Role};

use crate::llm::{CompletionError, CompletionParams, LlmClient, StreamEvent};
use crate::providers::sse::EventStreamDecoder;
use crate::retry::{with_retry, RetryConfig};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    retry: RetryConfig,
}

impl GatewayClient {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let api_key = env::var("GATEWAY_API_KEY").context("GATEWAY_API_KEY not set")?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            base_url,
            model: config.model.clone(),
            api_key,
            retry: RetryConfig::default(),
        })
    }
}

/// Convert the system instruction plus message list to wire format.
fn build_wire_messages(system: &str, messages: &[ChatMessage]) -> Vec<Value> {
    let mut wire = vec![json!({"role": "system", "content": system})];
    for msg in messages {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        wire.push(json!({"role": role, "content": msg.content}));
    }
    wire
}

/// Pull the generated text out of a non-streaming response body.
pub(crate) fn parse_completion_text(resp_json: &Value) -> Result<String, CompletionError> {
    resp_json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            CompletionError::Malformed("missing choices[0].message.content".to_string())
        })
}

/// Relay an SSE byte stream as text-delta events until `[DONE]`.
///
/// A dropped receiver means the caller cancelled mid-stream; forwarding just
/// stops, nothing downstream needs compensating.
pub(crate) async fn parse_gateway_sse<S>(
    mut byte_stream: S,
    tx: &mpsc::Sender<StreamEvent>,
) -> anyhow::Result<()>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    let mut decoder = EventStreamDecoder::new();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.context("Failed to read SSE chunk")?;
        decoder.feed(&chunk);

        while let Some(data) = decoder.next_data() {
            if data == "[DONE]" {
                let _ = tx.send(StreamEvent::Done).await;
                return Ok(());
            }

            // Non-JSON payloads are skipped, not fatal.
            let value: Value = match serde_json::from_str(&data) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if let Some(delta) = value["choices"][0]["delta"]["content"].as_str() {
                if !delta.is_empty()
                    && tx.send(StreamEvent::TextDelta(delta.to_string())).await.is_err()
                {
                    return Ok(());
                }
            }
        }
    }

    // Stream ended without the sentinel; treat as complete.
    let _ = tx.send(StreamEvent::Done).await;
    Ok(())
}

#[async_trait::async_trait]
impl LlmClient for GatewayClient {
    async fn complete(
        &self,
        system: &str,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<String, CompletionError> {
        let wire_messages = build_wire_messages(system, &messages);
        let payload = json!({
            "model": self.model,
            "messages": wire_messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let client = &self.client;
        let api_key = &self.api_key;

        let response = with_retry(&self.retry, "gateway", || async {
            client
                .post(&url)
                .bearer_auth(api_key)
                .json(&payload)
                .send()
                .await
        })
        .await?;

        let resp_json: Value = response
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;
        parse_completion_text(&resp_json)
    }

    async fn stream_complete(
        &self,
        system: &str,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<mpsc::Receiver<StreamEvent>, CompletionError> {
        let wire_messages = build_wire_messages(system, &messages);
        let payload = json!({
            "model": self.model,
            "messages": wire_messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "stream": true,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CompletionError::from_status(status.as_u16(), detail));
        }

        let (tx, rx) = mpsc::channel(64);
        let byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            if let Err(e) = parse_gateway_sse(byte_stream, &tx).await {
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn test_build_wire_messages() {
        let messages = vec![
            ChatMessage::user("today was rough"),
            ChatMessage::assistant("I'm here. What made it rough?"),
        ];
        let wire = build_wire_messages("You are a companion.", &messages);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[1]["role"], "user");
        assert_eq!(wire[1]["content"], "today was rough");
        assert_eq!(wire[2]["role"], "assistant");
    }

    #[test]
    fn test_parse_completion_text() {
        let resp = json!({
            "choices": [{
                "message": { "content": "That sounds heavy." },
                "finish_reason": "stop"
            }]
        });
        assert_eq!(parse_completion_text(&resp).unwrap(), "That sounds heavy.");

        let bad = json!({"choices": []});
        assert!(matches!(
            parse_completion_text(&bad),
            Err(CompletionError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_parse_gateway_sse_deltas_and_done() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
            )),
            Ok(Bytes::from(
                "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n",
            )),
        ];
        let (tx, mut rx) = mpsc::channel(8);
        parse_gateway_sse(stream::iter(chunks), &tx).await.unwrap();
        drop(tx);

        let mut text = String::new();
        let mut done = false;
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::TextDelta(t) => text.push_str(&t),
                StreamEvent::Done => done = true,
                StreamEvent::Error(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(text, "Hello");
        assert!(done);
    }

    #[tokio::test]
    async fn test_parse_gateway_sse_skips_junk_lines() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![Ok(Bytes::from(
            ": keepalive\ndata: not-json\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\ndata: [DONE]\n",
        ))];
        let (tx, mut rx) = mpsc::channel(8);
        parse_gateway_sse(stream::iter(chunks), &tx).await.unwrap();
        drop(tx);

        let mut deltas = Vec::new();
        while let Some(event) = rx.recv().await {
            if let StreamEvent::TextDelta(t) = event {
                deltas.push(t);
            }
        }
        assert_eq!(deltas, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_parse_gateway_sse_missing_sentinel_still_closes() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![Ok(Bytes::from(
            "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n",
        ))];
        let (tx, mut rx) = mpsc::channel(8);
        parse_gateway_sse(stream::iter(chunks), &tx).await.unwrap();
        drop(tx);

        let mut saw_done = false;
        while let Some(event) = rx.recv().await {
            if matches!(event, StreamEvent::Done) {
                saw_done = true;
            }
        }
        assert!(saw_done);
    }
}
