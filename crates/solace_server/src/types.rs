use serde::{Deserialize, Serialize};
use uuid::Uuid;

use solace_core::{ChatMessage, MemoryPack, SupportMode, UserStateDigest};
use solace_reasoning::{InsightOutcome, TurnRequest};

/// Inbound chat turn from any client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Full history, oldest first, ending with the latest user message.
    pub messages: Vec<ChatMessage>,
    /// One of the five mode labels, e.g. "Sit with me".
    #[serde(default)]
    pub support_mode: SupportMode,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    #[serde(default)]
    pub user_state: Option<UserStateDigest>,
    #[serde(default)]
    pub memory_pack: Option<MemoryPack>,
}

impl ChatRequest {
    /// Convert to an engine turn for the authenticated user.
    pub fn into_turn(self, user_id: Uuid) -> TurnRequest {
        TurnRequest {
            user_id,
            conversation_id: self.conversation_id,
            mode: self.support_mode,
            messages: self.messages,
            user_state: self.user_state,
            memory_pack: self.memory_pack,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightRequest {
    /// Defaults to the authenticated user when absent.
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatility_score: Option<i64>,
}

impl InsightResponse {
    pub fn from_outcome(outcome: &InsightOutcome) -> Self {
        Self {
            status: outcome.status(),
            volatility_score: match outcome {
                InsightOutcome::Generated { volatility_score } => Some(*volatility_score),
                _ => None,
            },
        }
    }
}

/// Error payload for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
