//! Weekly insight aggregation.
//!
//! Trailing 7-day batch per user: frequency tables over signals, a 0-100
//! volatility score from intensity variability, one narrative completion,
//! one upsert keyed on (user, week_start). Idempotent inside a 24-hour
//! cool-down; the conflict target is the backstop against concurrent runs.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use uuid::Uuid;

use solace_core::config::InsightConfig;
use solace_core::{ChatMessage, Intensity};
use solace_memory::{FreqEntry, NewInsight, SqliteStore};

use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::build_narrative_prompt;

const TOP_ENTRIES: usize = 3;
const NARRATIVE_CONTEXT_MESSAGES: i64 = 10;
const NARRATIVE_SNIPPET_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightOutcome {
    /// A fresh row for this week already exists; nothing was regenerated.
    Exists,
    /// Fewer than the minimum in-window signals; nothing was written.
    InsufficientData,
    Generated { volatility_score: i64 },
}

impl InsightOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            InsightOutcome::Exists => "exists",
            InsightOutcome::InsufficientData => "insufficient_data",
            InsightOutcome::Generated { .. } => "generated",
        }
    }
}

#[derive(Debug, Clone)]
struct WeekWindow {
    start_ts: i64,
    end_ts: i64,
    week_start: String,
    week_end: String,
}

/// Trailing window ending `now`: start is seven days back floored to the
/// beginning of its day, end ceiled to the last second of today.
fn week_window(now: DateTime<Utc>) -> WeekWindow {
    let today = now.date_naive();
    let start_date = today - Duration::days(7);
    let start = start_date.and_time(NaiveTime::MIN).and_utc();
    let end = (today + Duration::days(1)).and_time(NaiveTime::MIN).and_utc() - Duration::seconds(1);

    WeekWindow {
        start_ts: start.timestamp(),
        end_ts: end.timestamp(),
        week_start: start_date.format("%Y-%m-%d").to_string(),
        week_end: today.format("%Y-%m-%d").to_string(),
    }
}

/// Insertion-ordered frequency table. Stable sort on descending count, so
/// equal counts keep first-seen chronological order.
#[derive(Debug, Default)]
struct FreqTable {
    entries: Vec<(String, u32)>,
}

impl FreqTable {
    fn bump(&mut self, label: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(l, _)| l == label) {
            entry.1 += 1;
        } else {
            self.entries.push((label.to_string(), 1));
        }
    }

    fn top(self, n: usize) -> Vec<FreqEntry> {
        let mut entries = self.entries;
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
            .into_iter()
            .take(n)
            .map(|(label, count)| FreqEntry { label, count })
            .collect()
    }
}

/// Population standard deviation of the intensity series, scaled so one
/// full standard deviation scores 50, clamped to 100, then rounded.
fn volatility_score(scores: &[f64]) -> i64 {
    if scores.is_empty() {
        return 0;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
    (variance.sqrt() * 50.0).min(100.0).round() as i64
}

fn intensity_value(raw: &str) -> f64 {
    // Unknown intensity strings sit in the middle of the scale.
    Intensity::parse(raw).map(|i| i.score()).unwrap_or(2.0)
}

pub struct InsightGenerator {
    store: SqliteStore,
    client: Arc<dyn LlmClient>,
    config: InsightConfig,
}

impl InsightGenerator {
    pub fn new(store: SqliteStore, client: Arc<dyn LlmClient>, config: InsightConfig) -> Self {
        Self {
            store,
            client,
            config,
        }
    }

    pub async fn generate(&self, user_id: Uuid) -> Result<InsightOutcome> {
        self.generate_at(user_id, Utc::now()).await
    }

    /// `now` is injectable so the window math is testable.
    pub async fn generate_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<InsightOutcome> {
        let window = week_window(now);

        // Freshness short-circuit comes before any signal fetch.
        if let Some(existing) = self.store.find_insight(user_id, &window.week_start).await? {
            let age_secs = now.timestamp() - existing.created_at;
            if age_secs < self.config.cooldown_hours * 3600 {
                tracing::info!(
                    "Weekly insight for {} week {} is fresh, skipping",
                    user_id,
                    window.week_start
                );
                return Ok(InsightOutcome::Exists);
            }
        }

        let signals = self
            .store
            .signals_in_window(user_id, window.start_ts, window.end_ts)
            .await?;
        if signals.len() < self.config.min_signals {
            tracing::info!(
                "Only {} in-window signals for {}, need {}",
                signals.len(),
                user_id,
                self.config.min_signals
            );
            return Ok(InsightOutcome::InsufficientData);
        }

        let mut emotions = FreqTable::default();
        let mut triggers = FreqTable::default();
        let mut peaks = FreqTable::default();
        let mut intensities = Vec::with_capacity(signals.len());
        for signal in &signals {
            emotions.bump(&signal.primary_emotion);
            triggers.bump(&signal.context);
            peaks.bump(&signal.time_bucket);
            intensities.push(intensity_value(&signal.intensity));
        }

        let dominant_emotions = emotions.top(TOP_ENTRIES);
        let top_triggers = triggers.top(TOP_ENTRIES);
        let time_bucket_peaks = peaks.top(TOP_ENTRIES);
        let score = volatility_score(&intensities);

        let recent = self
            .store
            .messages_in_window(user_id, window.start_ts, window.end_ts, NARRATIVE_CONTEXT_MESSAGES)
            .await?;
        let recent_lines: Vec<String> = recent
            .iter()
            .map(|m| {
                let snippet: String = m.content.chars().take(NARRATIVE_SNIPPET_CHARS).collect();
                format!("{}: {}", m.role, snippet)
            })
            .collect();

        let emotion_labels: Vec<String> =
            dominant_emotions.iter().map(|e| e.label.clone()).collect();
        let trigger_labels: Vec<String> = top_triggers.iter().map(|e| e.label.clone()).collect();
        let prompt = build_narrative_prompt(
            &window.week_start,
            &window.week_end,
            &emotion_labels,
            &trigger_labels,
            score,
            &recent_lines,
        );

        let narrative = self
            .client
            .complete(
                &prompt,
                vec![ChatMessage::user("Write the weekly reflection now.")],
                CompletionParams {
                    max_tokens: 512,
                    temperature: 0.6,
                },
            )
            .await
            .context("Narrative generation failed")?;
        let narrative = narrative.trim().to_string();
        if narrative.is_empty() {
            anyhow::bail!("Narrative completion returned no text");
        }

        self.store
            .upsert_insight(NewInsight {
                user_id,
                week_start: window.week_start.clone(),
                week_end: window.week_end,
                dominant_emotions,
                top_triggers,
                time_bucket_peaks,
                volatility_score: score,
                narrative,
                created_at: now.timestamp(),
            })
            .await?;

        tracing::info!(
            "Generated weekly insight for {} week {} (volatility {})",
            user_id,
            window.week_start,
            score
        );
        Ok(InsightOutcome::Generated {
            volatility_score: score,
        })
    }
}
