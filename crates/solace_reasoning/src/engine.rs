//! Two-pass turn orchestration.
//!
//! Pass A produces a complete draft under the full persona prompt and is
//! fatal on failure. Pass B streams a rewrite of that draft under the
//! per-conversation rotation instructions; its stream is the caller-visible
//! reply. Memory extraction and snapshot refresh run detached after the
//! stream is handed off.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use solace_core::config::LlmConfig;
use solace_core::{classify, Bucket, ChatMessage, MemoryPack, Role, SupportMode, UserStateDigest};
use solace_memory::SqliteStore;

use crate::continuity;
use crate::extraction;
use crate::llm::{CompletionError, CompletionParams, LlmClient, StreamEvent};
use crate::prompts::{build_draft_prompt, build_rewrite_prompt, REWRITE_REQUEST, VARIATION_OPENERS};
use crate::rotation::RotationLedger;
use crate::validate::inspect_draft;

const MEMORY_PACK_CAP: usize = 12;

/// One inbound chat turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub user_id: Uuid,
    /// Rotation key; falls back to the user id for single-thread clients.
    pub conversation_id: Option<Uuid>,
    pub mode: SupportMode,
    /// Full history, oldest first, ending with the latest user message.
    pub messages: Vec<ChatMessage>,
    pub user_state: Option<UserStateDigest>,
    /// Caller-supplied pack override; when absent the store is consulted.
    pub memory_pack: Option<MemoryPack>,
}

pub struct TurnReply {
    pub bucket: Bucket,
    pub stream: mpsc::Receiver<StreamEvent>,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("request carries no user message")]
    EmptyTurn,
    #[error("draft generation failed: {0}")]
    Draft(CompletionError),
    #[error("rewrite stream failed: {0}")]
    Rewrite(CompletionError),
}

impl TurnError {
    /// Short, warm, non-technical text for the caller. Only rewrite-stage
    /// failures are classified; a failed draft reads as a generic stumble.
    pub fn user_message(&self) -> &'static str {
        match self {
            TurnError::Rewrite(CompletionError::RateLimited) => {
                "I need a moment to catch my breath. Please try again in a few seconds."
            }
            TurnError::Rewrite(CompletionError::QuotaExhausted) => {
                "The AI companion service needs attention. Please try again later."
            }
            _ => "Something went wrong. Let's try again in a moment.",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            TurnError::Rewrite(CompletionError::RateLimited) => 429,
            TurnError::Rewrite(CompletionError::QuotaExhausted) => 402,
            _ => 500,
        }
    }
}

pub struct TurnEngine {
    store: SqliteStore,
    client: Arc<dyn LlmClient>,
    rotation: RotationLedger,
    params: CompletionParams,
}

impl TurnEngine {
    pub fn new(store: SqliteStore, client: Arc<dyn LlmClient>, llm: &LlmConfig) -> Self {
        Self {
            store,
            client,
            rotation: RotationLedger::new(),
            params: CompletionParams {
                max_tokens: llm.max_tokens,
                temperature: llm.temperature,
            },
        }
    }

    pub async fn respond(&self, request: TurnRequest) -> Result<TurnReply, TurnError> {
        let user_text = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .ok_or(TurnError::EmptyTurn)?;

        let conversation_id = request.conversation_id.unwrap_or(request.user_id);
        let bucket = classify(&user_text, request.mode);
        tracing::info!(
            "Turn for {} classified as {} under {}",
            request.user_id,
            bucket,
            request.mode.label()
        );

        // Record the inbound message. A persistence hiccup must not block
        // the reply; extraction simply loses its evidence link.
        let now = Utc::now().timestamp();
        let message_id = match self
            .store
            .insert_message(
                request.user_id,
                "user",
                &user_text,
                Some(request.mode.label()),
                Some(bucket.label()),
                now,
            )
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Failed to record inbound message: {:#}", e);
                None
            }
        };

        let snapshot = match self.store.conversation_snapshot(request.user_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!("Snapshot unavailable: {:#}", e);
                None
            }
        };

        let pack = match request.memory_pack {
            Some(pack) => pack,
            None => match self
                .store
                .load_memory_pack(request.user_id, MEMORY_PACK_CAP)
                .await
            {
                Ok(pack) => pack,
                Err(e) => {
                    tracing::warn!("Failed to load memory pack: {:#}", e);
                    MemoryPack::default()
                }
            },
        };
        let user_state = request.user_state.unwrap_or_default();
        let moment = pack.memory_moment().map(|s| s.to_string());

        // Pass A: blocking draft. Without it there is nothing to rewrite.
        let opener = VARIATION_OPENERS[rand::thread_rng().gen_range(0..VARIATION_OPENERS.len())];
        let draft_prompt = build_draft_prompt(
            request.mode,
            bucket,
            &user_state,
            snapshot.as_ref(),
            &pack,
            moment.as_deref(),
            opener,
        );
        let draft = self
            .client
            .complete(&draft_prompt, request.messages.clone(), self.params.clone())
            .await
            .map_err(TurnError::Draft)?;

        let report = inspect_draft(&draft);
        if report.is_clean() {
            tracing::debug!(
                "Draft within constraints ({} words, {} questions)",
                report.word_count,
                report.question_marks
            );
        } else {
            tracing::warn!(
                "Draft out of constraints: words={} questions={} paragraphs={} forbidden={:?}",
                report.word_count,
                report.question_marks,
                report.paragraphs,
                report.forbidden_hits
            );
        }

        // The rotation advances on every turn, including suppressed ones,
        // so consecutive turns never repeat an opening shape.
        let (style, question) = self.rotation.advance(conversation_id).await;
        let end_in_statement = bucket == Bucket::Crisis
            || matches!(request.mode, SupportMode::JustListen | SupportMode::Challenge);
        let rewrite_prompt = build_rewrite_prompt(request.mode, bucket, style, question, end_in_statement);

        let mut rewrite_messages = request.messages;
        rewrite_messages.push(ChatMessage::assistant(draft.clone()));
        rewrite_messages.push(ChatMessage::user(REWRITE_REQUEST));

        // Pass B: the stream is the reply the caller sees.
        let stream = self
            .client
            .stream_complete(&rewrite_prompt, rewrite_messages, self.params.clone())
            .await
            .map_err(TurnError::Rewrite)?;

        // Detached post-turn work. Never awaited, never fails the turn.
        // The draft stands in for the assistant side of the exchange since
        // the rewrite is still streaming when these are spawned.
        let client = Arc::clone(&self.client);
        let store = self.store.clone();
        let user_id = request.user_id;
        let extraction_text = user_text.clone();
        let extraction_draft = draft.clone();
        tokio::spawn(async move {
            extraction::extract_and_store(
                client.as_ref(),
                &store,
                user_id,
                &extraction_text,
                &extraction_draft,
                &pack,
                message_id,
            )
            .await;
        });

        let client = Arc::clone(&self.client);
        let store = self.store.clone();
        tokio::spawn(async move {
            continuity::refresh_snapshot(client.as_ref(), &store, user_id, &user_text, &draft)
                .await;
        });

        Ok(TurnReply { bucket, stream })
    }
}
