//! Memory extraction: post-turn LLM call to distill durable facts.
//!
//! Runs detached after the reply stream is handed off. Candidates are
//! validated hard (type, length, emptiness), deduplicated against the user's
//! active memories by token-set similarity, then merged or inserted with an
//! evidence row either way. Unparseable model output is a silent no-op;
//! nothing here may fail the turn.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use solace_core::{ChatMessage, MemoryPack, MemoryType, SafetyLevel};
use solace_memory::{token_set_ratio, NewMemory, SqliteStore};

use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::build_extraction_prompt;

pub const MAX_MEMORIES_PER_TURN: usize = 3;
pub const MAX_MEMORY_CONTENT_CHARS: usize = 120;
pub const MAX_EVIDENCE_SNIPPET_CHARS: usize = 200;
/// Best-match similarity above this merges into the existing memory.
pub const MERGE_SIMILARITY_THRESHOLD: f64 = 0.8;
/// Confidence nudge applied on each merged re-observation, capped at 1.0.
pub const MERGE_CONFIDENCE_STEP: f32 = 0.05;

/// A raw candidate as the model reported it. `memory_type` stays a string
/// here so one unknown type rejects that candidate, not the whole batch.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryCandidate {
    pub memory_type: String,
    pub content: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub safety_level: Option<String>,
}

fn default_confidence() -> f32 {
    0.5
}

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
    memories: Vec<MemoryCandidate>,
}

#[derive(Debug, Clone)]
struct ValidCandidate {
    memory_type: MemoryType,
    content: String,
    confidence: f32,
    safety_level: SafetyLevel,
}

/// Extract durable memories from one exchange and store them.
///
/// Never returns an error: failures are logged and dropped, since this runs
/// on a detached background path.
pub async fn extract_and_store(
    client: &dyn LlmClient,
    store: &SqliteStore,
    user_id: Uuid,
    user_text: &str,
    assistant_text: &str,
    pack: &MemoryPack,
    evidence_message_id: Option<Uuid>,
) {
    if let Err(e) = extract_and_store_inner(
        client,
        store,
        user_id,
        user_text,
        assistant_text,
        pack,
        evidence_message_id,
    )
    .await
    {
        tracing::warn!("Memory extraction failed (non-fatal): {:#}", e);
    }
}

async fn extract_and_store_inner(
    client: &dyn LlmClient,
    store: &SqliteStore,
    user_id: Uuid,
    user_text: &str,
    assistant_text: &str,
    pack: &MemoryPack,
    evidence_message_id: Option<Uuid>,
) -> Result<()> {
    // Greetings and one-word check-ins have nothing worth keeping.
    if user_text.len() < 5 {
        return Ok(());
    }

    let exchange = format!("User: {}\nCompanion: {}", user_text, assistant_text);
    let params = CompletionParams {
        max_tokens: 512,
        temperature: 0.1,
    };

    let response = client
        .complete(
            &build_extraction_prompt(pack),
            vec![ChatMessage::user(exchange)],
            params,
        )
        .await
        .context("Extraction call failed")?;

    let candidates = parse_candidates(&response);
    let valid = validate_candidates(candidates);
    if valid.is_empty() {
        tracing::debug!("No storable memories in this exchange");
        return Ok(());
    }

    let now = Utc::now().timestamp();
    let snippet: String = user_text.chars().take(MAX_EVIDENCE_SNIPPET_CHARS).collect();

    for candidate in valid {
        let existing = store.active_memories(user_id, candidate.memory_type).await?;
        let best = existing
            .iter()
            .map(|row| (row, token_set_ratio(&row.content, &candidate.content)))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let memory_id = match best {
            Some((row, score)) if score > MERGE_SIMILARITY_THRESHOLD => {
                tracing::debug!(
                    "Merging candidate into memory {} (similarity {:.2})",
                    row.id,
                    score
                );
                store
                    .reinforce_memory(row.id, MERGE_CONFIDENCE_STEP, now)
                    .await?;
                row.id
            }
            _ => {
                store
                    .insert_memory(NewMemory {
                        user_id,
                        memory_type: candidate.memory_type,
                        content: candidate.content,
                        confidence: candidate.confidence,
                        safety_level: candidate.safety_level,
                        seen_at: now,
                    })
                    .await?
            }
        };

        store
            .insert_evidence(memory_id, evidence_message_id, &snippet, now)
            .await?;
    }

    Ok(())
}

/// Parse the model's response, tolerating common formatting quirks.
fn parse_candidates(text: &str) -> Vec<MemoryCandidate> {
    let trimmed = text.trim();

    // Try direct parse first
    if let Ok(resp) = serde_json::from_str::<ExtractionResponse>(trimmed) {
        return resp.memories;
    }

    // Try extracting JSON from a markdown code block or surrounding prose
    if let Some(json_start) = trimmed.find('{') {
        if let Some(json_end) = trimmed.rfind('}') {
            let json_str = &trimmed[json_start..=json_end];
            if let Ok(resp) = serde_json::from_str::<ExtractionResponse>(json_str) {
                return resp.memories;
            }
        }
    }

    // Try parsing as a bare array
    if let Some(arr_start) = trimmed.find('[') {
        if let Some(arr_end) = trimmed.rfind(']') {
            let arr_str = &trimmed[arr_start..=arr_end];
            if let Ok(memories) = serde_json::from_str::<Vec<MemoryCandidate>>(arr_str) {
                return memories;
            }
        }
    }

    tracing::debug!("Could not parse extraction response: {}", trimmed);
    Vec::new()
}

/// Hard validation gate: unknown type, over-length content, and empty
/// content each reject the candidate. At most 3 survive per turn.
fn validate_candidates(candidates: Vec<MemoryCandidate>) -> Vec<ValidCandidate> {
    candidates
        .into_iter()
        .filter_map(|c| {
            let memory_type = MemoryType::parse(&c.memory_type)?;
            let content = c.content.trim().to_string();
            if content.is_empty() || content.chars().count() > MAX_MEMORY_CONTENT_CHARS {
                return None;
            }
            let safety_level = c
                .safety_level
                .as_deref()
                .map(SafetyLevel::parse_or_default)
                .unwrap_or_default();
            Some(ValidCandidate {
                memory_type,
                content,
                confidence: c.confidence.clamp(0.0, 1.0),
                safety_level,
            })
        })
        .take(MAX_MEMORIES_PER_TURN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clean_json() {
        let json = r#"{"memories": [{"memory_type": "trigger", "content": "Sunday evenings feel heavy", "confidence": 0.8, "safety_level": "normal"}]}"#;
        let candidates = parse_candidates(json);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].memory_type, "trigger");
        assert!((candidates[0].confidence - 0.8).abs() < 0.01);
    }

    #[test]
    fn test_parse_code_block_wrapped() {
        let text = "```json\n{\"memories\": [{\"memory_type\": \"goal\", \"content\": \"Wants closer friendships\"}]}\n```";
        let candidates = parse_candidates(text);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].content, "Wants closer friendships");
    }

    #[test]
    fn test_parse_bare_array() {
        let text = r#"[{"memory_type": "preference", "content": "Prefers texting over calls"}]"#;
        let candidates = parse_candidates(text);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_parse_garbage_returns_empty() {
        assert!(parse_candidates("I could not find anything to extract.").is_empty());
        assert!(parse_candidates("").is_empty());
    }

    #[test]
    fn test_missing_confidence_defaults() {
        let json = r#"{"memories": [{"memory_type": "boundary", "content": "No work talk after nine"}]}"#;
        let candidates = parse_candidates(json);
        assert!((candidates[0].confidence - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_validation_rejects_unknown_type() {
        let candidates = vec![MemoryCandidate {
            memory_type: "favorite_color".to_string(),
            content: "Likes blue".to_string(),
            confidence: 0.9,
            safety_level: None,
        }];
        assert!(validate_candidates(candidates).is_empty());
    }

    #[test]
    fn test_validation_rejects_long_and_empty_content() {
        let candidates = vec![
            MemoryCandidate {
                memory_type: "trigger".to_string(),
                content: "x".repeat(MAX_MEMORY_CONTENT_CHARS + 1),
                confidence: 0.9,
                safety_level: None,
            },
            MemoryCandidate {
                memory_type: "trigger".to_string(),
                content: "   ".to_string(),
                confidence: 0.9,
                safety_level: None,
            },
            MemoryCandidate {
                memory_type: "trigger".to_string(),
                content: "Crowded trains spike anxiety".to_string(),
                confidence: 0.9,
                safety_level: Some("sensitive".to_string()),
            },
        ];
        let valid = validate_candidates(candidates);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].content, "Crowded trains spike anxiety");
        assert_eq!(valid[0].safety_level, SafetyLevel::Sensitive);
    }

    #[test]
    fn test_validation_caps_at_three() {
        let candidates: Vec<MemoryCandidate> = (0..5)
            .map(|i| MemoryCandidate {
                memory_type: "recurring_theme".to_string(),
                content: format!("Theme number {}", i),
                confidence: 0.6,
                safety_level: None,
            })
            .collect();
        assert_eq!(validate_candidates(candidates).len(), MAX_MEMORIES_PER_TURN);
    }

    #[test]
    fn test_out_of_range_confidence_is_clamped() {
        let candidates = vec![MemoryCandidate {
            memory_type: "goal".to_string(),
            content: "Wants to rebuild a sleep routine".to_string(),
            confidence: 1.7,
            safety_level: None,
        }];
        let valid = validate_candidates(candidates);
        assert!((valid[0].confidence - 1.0).abs() < f32::EPSILON);
    }
}
