//! SQLite-backed record store for the conversation pipeline.
//!
//! Ids are TEXT uuids, timestamps are i64 unix seconds, list-shaped columns
//! are JSON text with a `_json` suffix. Rows come back as raw strings at
//! this layer; callers parse into core enums where they care.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use solace_core::{MemoryPack, MemoryType, PackEntry, SafetyLevel};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub content: String,
    pub support_mode: Option<String>,
    pub bucket: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewSignal {
    pub user_id: Uuid,
    pub message_id: Option<Uuid>,
    pub primary_emotion: String,
    pub secondary_emotion: Option<String>,
    pub intensity: String,
    pub context: String,
    pub time_bucket: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct SignalRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message_id: Option<Uuid>,
    pub primary_emotion: String,
    pub secondary_emotion: Option<String>,
    pub intensity: String,
    pub context: String,
    pub time_bucket: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewMemory {
    pub user_id: Uuid,
    pub memory_type: MemoryType,
    pub content: String,
    pub confidence: f32,
    pub safety_level: SafetyLevel,
    pub seen_at: i64,
}

#[derive(Debug, Clone)]
pub struct MemoryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub memory_type: String,
    pub content: String,
    pub confidence: f32,
    pub evidence_count: i64,
    pub status: String,
    pub safety_level: String,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
}

#[derive(Debug, Clone)]
pub struct EvidenceRow {
    pub id: Uuid,
    pub memory_id: Uuid,
    pub message_id: Option<Uuid>,
    pub snippet: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    pub summary: String,
    pub themes: Vec<String>,
    pub last_updated: i64,
}

/// One (label, count) pair of a top-3 frequency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreqEntry {
    pub label: String,
    pub count: u32,
}

#[derive(Debug, Clone)]
pub struct NewInsight {
    pub user_id: Uuid,
    pub week_start: String,
    pub week_end: String,
    pub dominant_emotions: Vec<FreqEntry>,
    pub top_triggers: Vec<FreqEntry>,
    pub time_bucket_peaks: Vec<FreqEntry>,
    pub volatility_score: i64,
    pub narrative: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct InsightRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub week_start: String,
    pub week_end: String,
    pub dominant_emotions: Vec<FreqEntry>,
    pub top_triggers: Vec<FreqEntry>,
    pub time_bucket_peaks: Vec<FreqEntry>,
    pub volatility_score: i64,
    pub narrative: String,
    pub created_at: i64,
}

impl SqliteStore {
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON").execute(conn).await?;
                    Ok(())
                })
            })
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                support_mode TEXT,
                bucket TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create messages table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_user_time ON messages(user_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create messages index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                message_id TEXT,
                primary_emotion TEXT NOT NULL,
                secondary_emotion TEXT,
                intensity TEXT NOT NULL,
                context TEXT NOT NULL,
                time_bucket TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create signals table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_signals_user_time ON signals(user_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create signals index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_memory (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                memory_type TEXT NOT NULL,
                content TEXT NOT NULL,
                confidence REAL NOT NULL DEFAULT 0.5,
                evidence_count INTEGER NOT NULL DEFAULT 1,
                status TEXT NOT NULL DEFAULT 'active',
                safety_level TEXT NOT NULL DEFAULT 'normal',
                first_seen_at INTEGER NOT NULL,
                last_seen_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create user_memory table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_user_memory_lookup ON user_memory(user_id, memory_type, status)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create user_memory index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory_evidence (
                id TEXT PRIMARY KEY,
                memory_id TEXT NOT NULL REFERENCES user_memory(id),
                message_id TEXT,
                snippet TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create memory_evidence table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_memory_evidence_memory ON memory_evidence(memory_id)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create memory_evidence index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversation_state (
                user_id TEXT PRIMARY KEY,
                summary TEXT NOT NULL,
                themes_json TEXT NOT NULL,
                last_updated INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create conversation_state table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS weekly_insights (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                week_start TEXT NOT NULL,
                week_end TEXT NOT NULL,
                dominant_emotions_json TEXT NOT NULL,
                top_triggers_json TEXT NOT NULL,
                time_bucket_peaks_json TEXT NOT NULL,
                volatility_score INTEGER NOT NULL,
                narrative TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(user_id, week_start)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create weekly_insights table")?;

        Ok(())
    }

    // --- messages ---

    pub async fn insert_message(
        &self,
        user_id: Uuid,
        role: &str,
        content: &str,
        support_mode: Option<&str>,
        bucket: Option<&str>,
        created_at: i64,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO messages (id, user_id, role, content, support_mode, bucket, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(role)
        .bind(content)
        .bind(support_mode)
        .bind(bucket)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert message")?;
        Ok(id)
    }

    /// Messages in `[start, end]`, most recent first.
    pub async fn messages_in_window(
        &self,
        user_id: Uuid,
        start: i64,
        end: i64,
        limit: i64,
    ) -> Result<Vec<MessageRow>> {
        let rows = sqlx::query(
            "SELECT id, user_id, role, content, support_mode, bucket, created_at \
             FROM messages WHERE user_id = ? AND created_at >= ? AND created_at <= ? \
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(user_id.to_string())
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch messages")?;

        rows.iter().map(map_message_row).collect()
    }

    // --- signals ---

    pub async fn insert_signal(&self, signal: NewSignal) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO signals (id, user_id, message_id, primary_emotion, secondary_emotion, \
             intensity, context, time_bucket, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(signal.user_id.to_string())
        .bind(signal.message_id.map(|m| m.to_string()))
        .bind(&signal.primary_emotion)
        .bind(&signal.secondary_emotion)
        .bind(&signal.intensity)
        .bind(&signal.context)
        .bind(&signal.time_bucket)
        .bind(signal.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert signal")?;
        Ok(id)
    }

    /// Signals in `[start, end]`, oldest first so frequency tables keep
    /// first-seen insertion order.
    pub async fn signals_in_window(&self, user_id: Uuid, start: i64, end: i64) -> Result<Vec<SignalRow>> {
        let rows = sqlx::query(
            "SELECT id, user_id, message_id, primary_emotion, secondary_emotion, intensity, \
             context, time_bucket, created_at \
             FROM signals WHERE user_id = ? AND created_at >= ? AND created_at <= ? \
             ORDER BY created_at ASC",
        )
        .bind(user_id.to_string())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch signals")?;

        rows.iter().map(map_signal_row).collect()
    }

    // --- memories ---

    pub async fn insert_memory(&self, new: NewMemory) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO user_memory (id, user_id, memory_type, content, confidence, \
             evidence_count, status, safety_level, first_seen_at, last_seen_at) \
             VALUES (?, ?, ?, ?, ?, 1, 'active', ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(new.user_id.to_string())
        .bind(new.memory_type.as_str())
        .bind(&new.content)
        .bind(new.confidence)
        .bind(new.safety_level.as_str())
        .bind(new.seen_at)
        .bind(new.seen_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert memory")?;

        tracing::debug!("Stored memory {} ({}): {}", id, new.memory_type.as_str(), new.content);
        Ok(id)
    }

    /// Active memories of one type for one user, strongest first.
    pub async fn active_memories(&self, user_id: Uuid, memory_type: MemoryType) -> Result<Vec<MemoryRow>> {
        let rows = sqlx::query(
            "SELECT id, user_id, memory_type, content, confidence, evidence_count, status, \
             safety_level, first_seen_at, last_seen_at \
             FROM user_memory WHERE user_id = ? AND memory_type = ? AND status = 'active' \
             ORDER BY confidence DESC, last_seen_at DESC",
        )
        .bind(user_id.to_string())
        .bind(memory_type.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch active memories")?;

        rows.iter().map(map_memory_row).collect()
    }

    pub async fn memory_by_id(&self, memory_id: Uuid) -> Result<Option<MemoryRow>> {
        let row = sqlx::query(
            "SELECT id, user_id, memory_type, content, confidence, evidence_count, status, \
             safety_level, first_seen_at, last_seen_at FROM user_memory WHERE id = ?",
        )
        .bind(memory_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch memory")?;

        row.as_ref().map(map_memory_row).transpose()
    }

    /// Re-observation of an existing memory: bump the evidence count, nudge
    /// confidence up by `step` capped at 1.0, refresh `last_seen_at`.
    pub async fn reinforce_memory(&self, memory_id: Uuid, step: f32, seen_at: i64) -> Result<()> {
        sqlx::query(
            "UPDATE user_memory SET evidence_count = evidence_count + 1, \
             confidence = MIN(1.0, confidence + ?), last_seen_at = ? WHERE id = ?",
        )
        .bind(step)
        .bind(seen_at)
        .bind(memory_id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to reinforce memory")?;

        tracing::debug!("Reinforced memory {}", memory_id);
        Ok(())
    }

    /// Memories are never deleted, only archived out of the active set.
    pub async fn archive_memory(&self, memory_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE user_memory SET status = 'archived' WHERE id = ?")
            .bind(memory_id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to archive memory")?;
        Ok(())
    }

    /// The user's strongest active memories across all types, condensed for
    /// prompt injection.
    pub async fn load_memory_pack(&self, user_id: Uuid, cap: usize) -> Result<MemoryPack> {
        let rows = sqlx::query(
            "SELECT memory_type, content, confidence FROM user_memory \
             WHERE user_id = ? AND status = 'active' \
             ORDER BY confidence DESC, last_seen_at DESC LIMIT ?",
        )
        .bind(user_id.to_string())
        .bind(cap as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load memory pack")?;

        let entries = rows
            .iter()
            .filter_map(|row| {
                let raw_type: String = row.get("memory_type");
                Some(PackEntry {
                    memory_type: MemoryType::parse(&raw_type)?,
                    content: row.get("content"),
                    confidence: row.get::<f64, _>("confidence") as f32,
                })
            })
            .collect();

        Ok(MemoryPack::new(entries))
    }

    // --- evidence ---

    pub async fn insert_evidence(
        &self,
        memory_id: Uuid,
        message_id: Option<Uuid>,
        snippet: &str,
        created_at: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO memory_evidence (id, memory_id, message_id, snippet, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(memory_id.to_string())
        .bind(message_id.map(|m| m.to_string()))
        .bind(snippet)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert memory evidence")?;
        Ok(())
    }

    pub async fn evidence_for(&self, memory_id: Uuid) -> Result<Vec<EvidenceRow>> {
        let rows = sqlx::query(
            "SELECT id, memory_id, message_id, snippet, created_at \
             FROM memory_evidence WHERE memory_id = ? ORDER BY created_at ASC",
        )
        .bind(memory_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch memory evidence")?;

        rows.iter().map(map_evidence_row).collect()
    }

    // --- conversation state ---

    pub async fn conversation_snapshot(&self, user_id: Uuid) -> Result<Option<ConversationSnapshot>> {
        let row = sqlx::query(
            "SELECT summary, themes_json, last_updated FROM conversation_state WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch conversation state")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let themes: Vec<String> = serde_json::from_str(row.get("themes_json"))
            .context("Failed to parse conversation themes")?;
        Ok(Some(ConversationSnapshot {
            summary: row.get("summary"),
            themes,
            last_updated: row.get("last_updated"),
        }))
    }

    /// Replace the user's rolling snapshot wholesale. One row per user.
    pub async fn upsert_conversation_state(
        &self,
        user_id: Uuid,
        summary: &str,
        themes: &[String],
        updated_at: i64,
    ) -> Result<()> {
        let themes_json =
            serde_json::to_string(themes).context("Failed to serialize conversation themes")?;
        sqlx::query(
            "INSERT INTO conversation_state (user_id, summary, themes_json, last_updated) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET summary = excluded.summary, \
             themes_json = excluded.themes_json, last_updated = excluded.last_updated",
        )
        .bind(user_id.to_string())
        .bind(summary)
        .bind(themes_json)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert conversation state")?;
        Ok(())
    }

    // --- weekly insights ---

    pub async fn find_insight(&self, user_id: Uuid, week_start: &str) -> Result<Option<InsightRow>> {
        let row = sqlx::query(
            "SELECT id, user_id, week_start, week_end, dominant_emotions_json, \
             top_triggers_json, time_bucket_peaks_json, volatility_score, narrative, created_at \
             FROM weekly_insights WHERE user_id = ? AND week_start = ?",
        )
        .bind(user_id.to_string())
        .bind(week_start)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch weekly insight")?;

        row.as_ref().map(map_insight_row).transpose()
    }

    pub async fn upsert_insight(&self, insight: NewInsight) -> Result<()> {
        let emotions_json = serde_json::to_string(&insight.dominant_emotions)
            .context("Failed to serialize dominant emotions")?;
        let triggers_json = serde_json::to_string(&insight.top_triggers)
            .context("Failed to serialize top triggers")?;
        let peaks_json = serde_json::to_string(&insight.time_bucket_peaks)
            .context("Failed to serialize time bucket peaks")?;

        sqlx::query(
            "INSERT INTO weekly_insights (id, user_id, week_start, week_end, \
             dominant_emotions_json, top_triggers_json, time_bucket_peaks_json, \
             volatility_score, narrative, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id, week_start) DO UPDATE SET week_end = excluded.week_end, \
             dominant_emotions_json = excluded.dominant_emotions_json, \
             top_triggers_json = excluded.top_triggers_json, \
             time_bucket_peaks_json = excluded.time_bucket_peaks_json, \
             volatility_score = excluded.volatility_score, narrative = excluded.narrative, \
             created_at = excluded.created_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(insight.user_id.to_string())
        .bind(&insight.week_start)
        .bind(&insight.week_end)
        .bind(emotions_json)
        .bind(triggers_json)
        .bind(peaks_json)
        .bind(insight.volatility_score)
        .bind(&insight.narrative)
        .bind(insight.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert weekly insight")?;
        Ok(())
    }
}

fn map_message_row(row: &SqliteRow) -> Result<MessageRow> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    Ok(MessageRow {
        id: Uuid::parse_str(&id)?,
        user_id: Uuid::parse_str(&user_id)?,
        role: row.get("role"),
        content: row.get("content"),
        support_mode: row.get("support_mode"),
        bucket: row.get("bucket"),
        created_at: row.get("created_at"),
    })
}

fn map_signal_row(row: &SqliteRow) -> Result<SignalRow> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let message_id: Option<String> = row.get("message_id");
    Ok(SignalRow {
        id: Uuid::parse_str(&id)?,
        user_id: Uuid::parse_str(&user_id)?,
        message_id: message_id.as_deref().map(Uuid::parse_str).transpose()?,
        primary_emotion: row.get("primary_emotion"),
        secondary_emotion: row.get("secondary_emotion"),
        intensity: row.get("intensity"),
        context: row.get("context"),
        time_bucket: row.get("time_bucket"),
        created_at: row.get("created_at"),
    })
}

fn map_memory_row(row: &SqliteRow) -> Result<MemoryRow> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    Ok(MemoryRow {
        id: Uuid::parse_str(&id)?,
        user_id: Uuid::parse_str(&user_id)?,
        memory_type: row.get("memory_type"),
        content: row.get("content"),
        confidence: row.get::<f64, _>("confidence") as f32,
        evidence_count: row.get("evidence_count"),
        status: row.get("status"),
        safety_level: row.get("safety_level"),
        first_seen_at: row.get("first_seen_at"),
        last_seen_at: row.get("last_seen_at"),
    })
}

fn map_evidence_row(row: &SqliteRow) -> Result<EvidenceRow> {
    let id: String = row.get("id");
    let memory_id: String = row.get("memory_id");
    let message_id: Option<String> = row.get("message_id");
    Ok(EvidenceRow {
        id: Uuid::parse_str(&id)?,
        memory_id: Uuid::parse_str(&memory_id)?,
        message_id: message_id.as_deref().map(Uuid::parse_str).transpose()?,
        snippet: row.get("snippet"),
        created_at: row.get("created_at"),
    })
}

fn map_insight_row(row: &SqliteRow) -> Result<InsightRow> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let dominant_emotions: Vec<FreqEntry> = serde_json::from_str(row.get("dominant_emotions_json"))
        .context("Failed to parse dominant emotions")?;
    let top_triggers: Vec<FreqEntry> =
        serde_json::from_str(row.get("top_triggers_json")).context("Failed to parse top triggers")?;
    let time_bucket_peaks: Vec<FreqEntry> = serde_json::from_str(row.get("time_bucket_peaks_json"))
        .context("Failed to parse time bucket peaks")?;
    Ok(InsightRow {
        id: Uuid::parse_str(&id)?,
        user_id: Uuid::parse_str(&user_id)?,
        week_start: row.get("week_start"),
        week_end: row.get("week_end"),
        dominant_emotions,
        top_triggers,
        time_bucket_peaks,
        volatility_score: row.get("volatility_score"),
        narrative: row.get("narrative"),
        created_at: row.get("created_at"),
    })
}
