use uuid::Uuid;

use crate::store::{NewInsight, NewMemory, NewSignal, SqliteStore};
use crate::FreqEntry;
use solace_core::{MemoryType, SafetyLevel};

fn signal_at(user_id: Uuid, emotion: &str, created_at: i64) -> NewSignal {
    NewSignal {
        user_id,
        message_id: None,
        primary_emotion: emotion.to_string(),
        secondary_emotion: None,
        intensity: "moderate".to_string(),
        context: "work".to_string(),
        time_bucket: "evening".to_string(),
        created_at,
    }
}

fn memory_of(user_id: Uuid, memory_type: MemoryType, content: &str, confidence: f32) -> NewMemory {
    NewMemory {
        user_id,
        memory_type,
        content: content.to_string(),
        confidence,
        safety_level: SafetyLevel::Normal,
        seen_at: 1_000,
    }
}

#[tokio::test]
async fn test_message_window_ordering() {
    let store = SqliteStore::open(":memory:")
        .await
        .expect("Failed to create store");
    let user = Uuid::new_v4();

    for t in [100, 200, 300] {
        store
            .insert_message(user, "user", &format!("message at {}", t), None, None, t)
            .await
            .expect("Insert failed");
    }

    // 1. Full window, most recent first
    let rows = store
        .messages_in_window(user, 0, 1_000, 10)
        .await
        .expect("Fetch failed");
    let times: Vec<i64> = rows.iter().map(|m| m.created_at).collect();
    assert_eq!(times, vec![300, 200, 100]);

    // 2. Limit applies after ordering
    let rows = store
        .messages_in_window(user, 0, 1_000, 2)
        .await
        .expect("Fetch failed");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].created_at, 300);

    // 3. Window boundaries are inclusive
    let rows = store
        .messages_in_window(user, 200, 300, 10)
        .await
        .expect("Fetch failed");
    assert_eq!(rows.len(), 2);

    // 4. Other users are invisible
    let rows = store
        .messages_in_window(Uuid::new_v4(), 0, 1_000, 10)
        .await
        .expect("Fetch failed");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_signal_window_ascending() {
    let store = SqliteStore::open(":memory:")
        .await
        .expect("Failed to create store");
    let user = Uuid::new_v4();

    for (emotion, t) in [("anxious", 300), ("sad", 100), ("calm", 200)] {
        store
            .insert_signal(signal_at(user, emotion, t))
            .await
            .expect("Insert failed");
    }

    let rows = store
        .signals_in_window(user, 100, 300)
        .await
        .expect("Fetch failed");
    let emotions: Vec<&str> = rows.iter().map(|s| s.primary_emotion.as_str()).collect();
    assert_eq!(emotions, vec!["sad", "calm", "anxious"]);

    let rows = store
        .signals_in_window(user, 150, 250)
        .await
        .expect("Fetch failed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].primary_emotion, "calm");
}

#[tokio::test]
async fn test_reinforce_bumps_and_caps_confidence() {
    let store = SqliteStore::open(":memory:")
        .await
        .expect("Failed to create store");
    let user = Uuid::new_v4();

    // 1. Normal bump
    let id = store
        .insert_memory(memory_of(user, MemoryType::Trigger, "Sunday evenings feel heavy", 0.5))
        .await
        .expect("Insert failed");
    store
        .reinforce_memory(id, 0.05, 2_000)
        .await
        .expect("Reinforce failed");

    let row = store
        .memory_by_id(id)
        .await
        .expect("Fetch failed")
        .expect("Memory should exist");
    assert!((row.confidence - 0.55).abs() < 1e-6);
    assert_eq!(row.evidence_count, 2);
    assert_eq!(row.last_seen_at, 2_000);
    assert_eq!(row.first_seen_at, 1_000);

    // 2. Confidence is capped at 1.0
    let id = store
        .insert_memory(memory_of(user, MemoryType::Goal, "Wants to leave work on time", 0.98))
        .await
        .expect("Insert failed");
    store
        .reinforce_memory(id, 0.05, 2_000)
        .await
        .expect("Reinforce failed");
    let row = store
        .memory_by_id(id)
        .await
        .expect("Fetch failed")
        .expect("Memory should exist");
    assert!((row.confidence - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_archive_removes_from_active_set_only() {
    let store = SqliteStore::open(":memory:")
        .await
        .expect("Failed to create store");
    let user = Uuid::new_v4();

    let id = store
        .insert_memory(memory_of(user, MemoryType::Preference, "Prefers texting over calls", 0.6))
        .await
        .expect("Insert failed");

    store.archive_memory(id).await.expect("Archive failed");

    let active = store
        .active_memories(user, MemoryType::Preference)
        .await
        .expect("Fetch failed");
    assert!(active.is_empty());

    // Row still exists, just archived
    let row = store
        .memory_by_id(id)
        .await
        .expect("Fetch failed")
        .expect("Memory should exist");
    assert_eq!(row.status, "archived");
}

#[tokio::test]
async fn test_memory_pack_strongest_first() {
    let store = SqliteStore::open(":memory:")
        .await
        .expect("Failed to create store");
    let user = Uuid::new_v4();

    store
        .insert_memory(memory_of(user, MemoryType::Trigger, "Deadlines spike anxiety", 0.5))
        .await
        .expect("Insert failed");
    store
        .insert_memory(memory_of(user, MemoryType::CopingPattern, "Walks help settle thoughts", 0.9))
        .await
        .expect("Insert failed");
    store
        .insert_memory(memory_of(user, MemoryType::Goal, "Wants closer friendships", 0.7))
        .await
        .expect("Insert failed");

    let pack = store.load_memory_pack(user, 12).await.expect("Load failed");
    let contents: Vec<&str> = pack.entries.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "Walks help settle thoughts",
            "Wants closer friendships",
            "Deadlines spike anxiety"
        ]
    );

    let capped = store.load_memory_pack(user, 2).await.expect("Load failed");
    assert_eq!(capped.entries.len(), 2);
}

#[tokio::test]
async fn test_evidence_rows_accumulate() {
    let store = SqliteStore::open(":memory:")
        .await
        .expect("Failed to create store");
    let user = Uuid::new_v4();

    let memory_id = store
        .insert_memory(memory_of(user, MemoryType::RecurringTheme, "Feels unseen at work", 0.5))
        .await
        .expect("Insert failed");

    let message_id = store
        .insert_message(user, "user", "nobody noticed the launch went well", None, None, 100)
        .await
        .expect("Insert failed");

    store
        .insert_evidence(memory_id, Some(message_id), "nobody noticed the launch", 100)
        .await
        .expect("Insert failed");
    store
        .insert_evidence(memory_id, None, "same feeling after the review", 200)
        .await
        .expect("Insert failed");

    let evidence = store.evidence_for(memory_id).await.expect("Fetch failed");
    assert_eq!(evidence.len(), 2);
    assert_eq!(evidence[0].message_id, Some(message_id));
    assert_eq!(evidence[1].message_id, None);
}

#[tokio::test]
async fn test_conversation_state_upsert_replaces_wholesale() {
    let store = SqliteStore::open(":memory:")
        .await
        .expect("Failed to create store");
    let user = Uuid::new_v4();

    assert!(store
        .conversation_snapshot(user)
        .await
        .expect("Fetch failed")
        .is_none());

    store
        .upsert_conversation_state(user, "Talked through a hard week", &["work".to_string()], 100)
        .await
        .expect("Upsert failed");

    let themes = vec!["friendship".to_string(), "rest".to_string()];
    store
        .upsert_conversation_state(user, "Shifted toward what recharges them", &themes, 200)
        .await
        .expect("Upsert failed");

    let snapshot = store
        .conversation_snapshot(user)
        .await
        .expect("Fetch failed")
        .expect("Snapshot should exist");
    assert_eq!(snapshot.summary, "Shifted toward what recharges them");
    assert_eq!(snapshot.themes, themes);
    assert_eq!(snapshot.last_updated, 200);
}

#[tokio::test]
async fn test_weekly_insight_upsert_is_keyed_by_user_and_week() {
    let store = SqliteStore::open(":memory:")
        .await
        .expect("Failed to create store");
    let user = Uuid::new_v4();

    let base = NewInsight {
        user_id: user,
        week_start: "2026-08-17".to_string(),
        week_end: "2026-08-23".to_string(),
        dominant_emotions: vec![FreqEntry {
            label: "anxious".to_string(),
            count: 4,
        }],
        top_triggers: vec![],
        time_bucket_peaks: vec![],
        volatility_score: 38,
        narrative: "first narrative".to_string(),
        created_at: 1_000,
    };
    store.upsert_insight(base.clone()).await.expect("Upsert failed");

    // Same (user, week) replaces in place
    let mut replacement = base.clone();
    replacement.volatility_score = 52;
    replacement.narrative = "second narrative".to_string();
    replacement.created_at = 2_000;
    store.upsert_insight(replacement).await.expect("Upsert failed");

    let row = store
        .find_insight(user, "2026-08-17")
        .await
        .expect("Fetch failed")
        .expect("Insight should exist");
    assert_eq!(row.volatility_score, 52);
    assert_eq!(row.narrative, "second narrative");
    assert_eq!(row.created_at, 2_000);
    assert_eq!(row.dominant_emotions[0].label, "anxious");

    // Different week is a separate row
    let mut other_week = base;
    other_week.week_start = "2026-08-24".to_string();
    other_week.week_end = "2026-08-30".to_string();
    store.upsert_insight(other_week).await.expect("Upsert failed");

    assert!(store
        .find_insight(user, "2026-08-24")
        .await
        .expect("Fetch failed")
        .is_some());
    assert!(store
        .find_insight(user, "2026-08-17")
        .await
        .expect("Fetch failed")
        .is_some());
}

#[tokio::test]
async fn test_reopen_preserves_rows() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("solace.db");

    let user = Uuid::new_v4();
    let memory_id = {
        let store = SqliteStore::open(&db_path)
            .await
            .expect("Failed to create store");
        store
            .insert_memory(memory_of(user, MemoryType::Boundary, "No work talk after nine", 0.8))
            .await
            .expect("Insert failed")
    };

    let store = SqliteStore::open(&db_path)
        .await
        .expect("Failed to reopen store");
    let row = store
        .memory_by_id(memory_id)
        .await
        .expect("Fetch failed")
        .expect("Memory should survive reopen");
    assert_eq!(row.content, "No work talk after nine");
    assert!((row.confidence - 0.8).abs() < 1e-6);
}
