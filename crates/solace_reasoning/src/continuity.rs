//! Conversation continuity tracker.
//!
//! One completion per turn distills the exchange into a rolling (summary,
//! themes) snapshot, upserted wholesale onto the user's single
//! conversation_state row. Malformed output is a silent no-op, same policy
//! as extraction: background work never fails the turn.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use solace_core::ChatMessage;
use solace_memory::SqliteStore;

use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::SNAPSHOT_PROMPT;

const MAX_THEMES: usize = 3;

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    summary: String,
    #[serde(default)]
    themes: Vec<String>,
}

/// Refresh the user's continuity snapshot from the latest exchange.
pub async fn refresh_snapshot(
    client: &dyn LlmClient,
    store: &SqliteStore,
    user_id: Uuid,
    user_text: &str,
    assistant_text: &str,
) {
    if let Err(e) = refresh_snapshot_inner(client, store, user_id, user_text, assistant_text).await
    {
        tracing::warn!("Snapshot refresh failed (non-fatal): {:#}", e);
    }
}

async fn refresh_snapshot_inner(
    client: &dyn LlmClient,
    store: &SqliteStore,
    user_id: Uuid,
    user_text: &str,
    assistant_text: &str,
) -> Result<()> {
    let exchange = format!("User: {}\nCompanion: {}", user_text, assistant_text);
    let params = CompletionParams {
        max_tokens: 256,
        temperature: 0.2,
    };

    let response = client
        .complete(SNAPSHOT_PROMPT, vec![ChatMessage::user(exchange)], params)
        .await
        .context("Snapshot call failed")?;

    let Some(snapshot) = parse_snapshot(&response) else {
        tracing::debug!("Could not parse snapshot response: {}", response.trim());
        return Ok(());
    };

    store
        .upsert_conversation_state(
            user_id,
            &snapshot.summary,
            &snapshot.themes,
            Utc::now().timestamp(),
        )
        .await?;

    tracing::debug!("Refreshed snapshot for {}: {:?}", user_id, snapshot.themes);
    Ok(())
}

/// Parse and normalize, tolerating code fences and surrounding prose.
/// Returns `None` for anything that does not yield a non-empty summary and
/// 1-3 non-empty themes.
fn parse_snapshot(text: &str) -> Option<SnapshotResponse> {
    let trimmed = text.trim();

    let parsed = serde_json::from_str::<SnapshotResponse>(trimmed)
        .ok()
        .or_else(|| {
            let start = trimmed.find('{')?;
            let end = trimmed.rfind('}')?;
            serde_json::from_str(&trimmed[start..=end]).ok()
        })?;

    let summary = parsed.summary.trim().to_string();
    let themes: Vec<String> = parsed
        .themes
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .take(MAX_THEMES)
        .collect();

    if summary.is_empty() || themes.is_empty() {
        return None;
    }
    Some(SnapshotResponse { summary, themes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clean_snapshot() {
        let json = r#"{"summary": "They are circling a decision about leaving.", "themes": ["work", "self-trust"]}"#;
        let snapshot = parse_snapshot(json).unwrap();
        assert_eq!(snapshot.summary, "They are circling a decision about leaving.");
        assert_eq!(snapshot.themes, vec!["work", "self-trust"]);
    }

    #[test]
    fn test_parse_code_fenced_snapshot() {
        let text = "```json\n{\"summary\": \"A quieter check-in.\", \"themes\": [\"rest\"]}\n```";
        let snapshot = parse_snapshot(text).unwrap();
        assert_eq!(snapshot.themes, vec!["rest"]);
    }

    #[test]
    fn test_themes_truncate_to_three() {
        let json = r#"{"summary": "Busy week.", "themes": ["a", "b", "c", "d", "e"]}"#;
        let snapshot = parse_snapshot(json).unwrap();
        assert_eq!(snapshot.themes.len(), 3);
    }

    #[test]
    fn test_garbage_is_none() {
        assert!(parse_snapshot("not json at all").is_none());
        assert!(parse_snapshot("").is_none());
    }

    #[test]
    fn test_empty_summary_or_themes_is_none() {
        assert!(parse_snapshot(r#"{"summary": "  ", "themes": ["work"]}"#).is_none());
        assert!(parse_snapshot(r#"{"summary": "Fine week.", "themes": []}"#).is_none());
        assert!(parse_snapshot(r#"{"summary": "Fine week.", "themes": ["  "]}"#).is_none());
    }
}
