//! Reasoning layer: classification-driven prompt assembly, the two-pass
//! generation engine, background memory extraction, and the weekly
//! insight aggregator. Providers implement [`llm::LlmClient`]; everything
//! above the trait is provider-agnostic.

pub mod continuity;
pub mod engine;
pub mod extraction;
pub mod insight;
pub mod llm;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod rotation;
pub mod validate;

pub use engine::{TurnEngine, TurnError, TurnReply, TurnRequest};
pub use insight::{InsightGenerator, InsightOutcome};
pub use llm::{CompletionError, CompletionParams, LlmClient, StreamEvent};
pub use providers::{GatewayClient, MockProvider};
