//! Bounded retry for blocking gateway calls.
//!
//! Only transient failures are retried: network errors and 5xx/408
//! statuses. Rate limits (429) and quota exhaustion (402) surface
//! immediately with their classification intact so the turn pipeline can
//! map them to the right user-facing message. Streaming requests never
//! come through here; a stream cannot be re-issued once chunks may have
//! been consumed.

use std::time::Duration;

use rand::Rng;
use reqwest::Response;

use crate::llm::CompletionError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempt budget, counting the first call.
    pub attempts: u32,
    /// Delay before the second attempt; doubles on each retry.
    pub base_delay: Duration,
    /// Ceiling on the computed delay, jitter excluded.
    pub cap: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
            cap: Duration::from_secs(30),
        }
    }
}

/// Whether retrying can plausibly change the outcome. Classified failures
/// (429, 402) and client errors must reach the caller untouched.
fn is_transient(error: &CompletionError) -> bool {
    match error {
        CompletionError::Network(_) => true,
        CompletionError::Api { status, .. } => matches!(status, 500 | 502 | 503 | 504 | 408),
        _ => false,
    }
}

fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let scaled = config.base_delay.saturating_mul(1u32 << (attempt - 1).min(16));
    scaled.min(config.cap) + Duration::from_millis(rand::thread_rng().gen_range(0..500))
}

/// Run `operation` until it yields a success status, a non-transient
/// failure, or the attempt budget runs out.
pub async fn with_retry<F, Fut>(
    config: &RetryConfig,
    label: &str,
    operation: F,
) -> Result<Response, CompletionError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        let error = match operation().await {
            Ok(response) if response.status().is_success() => {
                if attempt > 1 {
                    tracing::info!("{} recovered on attempt {}", label, attempt);
                }
                return Ok(response);
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let detail = response.text().await.unwrap_or_default();
                CompletionError::from_status(status, detail)
            }
            Err(e) => CompletionError::Network(e.to_string()),
        };

        if !is_transient(&error) || attempt >= config.attempts {
            return Err(error);
        }

        let wait = backoff_delay(config, attempt);
        tracing::warn!(
            "{} attempt {}/{} failed ({}), retrying in {:.1}s",
            label,
            attempt,
            config.attempts,
            error,
            wait.as_secs_f64()
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}
