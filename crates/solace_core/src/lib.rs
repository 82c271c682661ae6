pub mod classify;
pub mod config;

pub use classify::{classify, Bucket};
pub use config::SolaceConfig;

use serde::{Deserialize, Serialize};

/// Message role as carried over the wire and into completion requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One turn of conversation, inbound or generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// User-selected conversational stance. Restricts which buckets the
/// classifier may pick (see `classify`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SupportMode {
    #[default]
    #[serde(rename = "Reflect with me")]
    Reflect,
    #[serde(rename = "Sit with me")]
    SitWithMe,
    #[serde(rename = "Challenge me gently")]
    Challenge,
    #[serde(rename = "Help me decide")]
    Decide,
    #[serde(rename = "Just listen")]
    JustListen,
}

impl SupportMode {
    pub fn label(self) -> &'static str {
        match self {
            SupportMode::Reflect => "Reflect with me",
            SupportMode::SitWithMe => "Sit with me",
            SupportMode::Challenge => "Challenge me gently",
            SupportMode::Decide => "Help me decide",
            SupportMode::JustListen => "Just listen",
        }
    }
}

/// Category of a durable user memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    RecurringTheme,
    Trigger,
    CopingPattern,
    Preference,
    RelationshipContext,
    Goal,
    Boundary,
}

impl MemoryType {
    pub const ALL: [MemoryType; 7] = [
        MemoryType::RecurringTheme,
        MemoryType::Trigger,
        MemoryType::CopingPattern,
        MemoryType::Preference,
        MemoryType::RelationshipContext,
        MemoryType::Goal,
        MemoryType::Boundary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MemoryType::RecurringTheme => "recurring_theme",
            MemoryType::Trigger => "trigger",
            MemoryType::CopingPattern => "coping_pattern",
            MemoryType::Preference => "preference",
            MemoryType::RelationshipContext => "relationship_context",
            MemoryType::Goal => "goal",
            MemoryType::Boundary => "boundary",
        }
    }

    /// Parse a stored or model-reported type string. Anything outside the
    /// fixed set is `None`, which callers treat as a rejected candidate.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "recurring_theme" => Some(MemoryType::RecurringTheme),
            "trigger" => Some(MemoryType::Trigger),
            "coping_pattern" => Some(MemoryType::CopingPattern),
            "preference" => Some(MemoryType::Preference),
            "relationship_context" => Some(MemoryType::RelationshipContext),
            "goal" => Some(MemoryType::Goal),
            "boundary" => Some(MemoryType::Boundary),
            _ => None,
        }
    }

    /// Human phrasing for prompt text ("coping pattern", not "coping_pattern").
    pub fn human(self) -> &'static str {
        match self {
            MemoryType::RecurringTheme => "recurring theme",
            MemoryType::Trigger => "trigger",
            MemoryType::CopingPattern => "coping pattern",
            MemoryType::Preference => "preference",
            MemoryType::RelationshipContext => "relationship context",
            MemoryType::Goal => "goal",
            MemoryType::Boundary => "boundary",
        }
    }
}

/// Emotional intensity of a classified signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Moderate,
    High,
}

impl Intensity {
    pub fn as_str(self) -> &'static str {
        match self {
            Intensity::Low => "low",
            Intensity::Moderate => "moderate",
            Intensity::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Intensity::Low),
            "moderate" => Some(Intensity::Moderate),
            "high" => Some(Intensity::High),
            _ => None,
        }
    }

    /// Numeric scale used by the volatility computation.
    pub fn score(self) -> f64 {
        match self {
            Intensity::Low => 1.0,
            Intensity::Moderate => 2.0,
            Intensity::High => 3.0,
        }
    }
}

/// Sensitivity marker attached to stored memories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    #[default]
    Normal,
    Sensitive,
    CrisisRelated,
}

impl SafetyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SafetyLevel::Normal => "normal",
            SafetyLevel::Sensitive => "sensitive",
            SafetyLevel::CrisisRelated => "crisis_related",
        }
    }

    /// Unknown strings fall back to `Normal` rather than rejecting the
    /// candidate; only `memory_type` is a hard gate.
    pub fn parse_or_default(s: &str) -> Self {
        match s {
            "sensitive" => SafetyLevel::Sensitive,
            "crisis_related" => SafetyLevel::CrisisRelated,
            _ => SafetyLevel::Normal,
        }
    }
}

/// Lifecycle of a stored memory. Rows are archived, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStatus {
    Active,
    Archived,
}

impl MemoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryStatus::Active => "active",
            MemoryStatus::Archived => "archived",
        }
    }
}

/// Pre-computed emotional context for the draft prompt. All fields optional;
/// an empty digest renders to nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStateDigest {
    pub top_emotions: Vec<String>,
    pub top_contexts: Vec<String>,
    pub intensity_trend: Option<String>,
    pub recurring_themes: Vec<String>,
    pub time_bucket_pattern: Option<String>,
}

impl UserStateDigest {
    pub fn is_empty(&self) -> bool {
        self.top_emotions.is_empty()
            && self.top_contexts.is_empty()
            && self.intensity_trend.is_none()
            && self.recurring_themes.is_empty()
            && self.time_bucket_pattern.is_none()
    }

    /// Render as prompt lines. Stats are phrased for natural reference,
    /// never for quoting back at the user.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if !self.top_emotions.is_empty() {
            lines.push(format!("- Recent emotions: {}", self.top_emotions.join(", ")));
        }
        if !self.top_contexts.is_empty() {
            lines.push(format!("- Common contexts: {}", self.top_contexts.join(", ")));
        }
        if let Some(trend) = &self.intensity_trend {
            lines.push(format!("- Intensity trend: {}", trend));
        }
        if !self.recurring_themes.is_empty() {
            lines.push(format!(
                "- Recurring themes: {}",
                self.recurring_themes.join(", ")
            ));
        }
        if let Some(pattern) = &self.time_bucket_pattern {
            lines.push(format!("- Typically reaches out: {}", pattern));
        }
        lines.join("\n")
    }
}

/// One entry of a memory pack: an active memory condensed for prompting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackEntry {
    pub memory_type: MemoryType,
    pub content: String,
    #[serde(default = "default_pack_confidence")]
    pub confidence: f32,
}

fn default_pack_confidence() -> f32 {
    0.5
}

/// The user's active memories, condensed for prompt injection and for
/// deduplication context during extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryPack {
    pub entries: Vec<PackEntry>,
}

impl MemoryPack {
    pub fn new(entries: Vec<PackEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as prompt lines, one memory per line. Order is the caller's
    /// (confidence descending from the store).
    pub fn digest(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("- ({}) {}", e.memory_type.human(), e.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Pick one well-established memory worth referencing naturally this
    /// turn, if any. Highest-confidence entry at or above 0.6.
    pub fn memory_moment(&self) -> Option<&str> {
        self.entries
            .iter()
            .filter(|e| e.confidence >= 0.6)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|e| e.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_support_mode_serde_labels() {
        let mode: SupportMode = serde_json::from_str("\"Just listen\"").unwrap();
        assert_eq!(mode, SupportMode::JustListen);
        assert_eq!(serde_json::to_string(&mode).unwrap(), "\"Just listen\"");
    }

    #[test]
    fn test_memory_type_parse_roundtrip() {
        for mt in MemoryType::ALL {
            assert_eq!(MemoryType::parse(mt.as_str()), Some(mt));
        }
        assert_eq!(MemoryType::parse("favorite_color"), None);
    }

    #[test]
    fn test_intensity_scores() {
        assert_eq!(Intensity::Low.score(), 1.0);
        assert_eq!(Intensity::Moderate.score(), 2.0);
        assert_eq!(Intensity::High.score(), 3.0);
        assert_eq!(Intensity::parse("extreme"), None);
    }

    #[test]
    fn test_safety_level_unknown_falls_back() {
        assert_eq!(SafetyLevel::parse_or_default("sensitive"), SafetyLevel::Sensitive);
        assert_eq!(SafetyLevel::parse_or_default("whatever"), SafetyLevel::Normal);
    }

    #[test]
    fn test_digest_render_skips_empty_fields() {
        let digest = UserStateDigest {
            top_emotions: vec!["sad".into(), "anxious".into()],
            ..Default::default()
        };
        let rendered = digest.render();
        assert!(rendered.contains("sad, anxious"));
        assert!(!rendered.contains("Intensity trend"));

        assert!(UserStateDigest::default().is_empty());
    }

    #[test]
    fn test_memory_moment_prefers_confident_entries() {
        let pack = MemoryPack::new(vec![
            PackEntry {
                memory_type: MemoryType::Preference,
                content: "Prefers quiet evenings to recharge".into(),
                confidence: 0.5,
            },
            PackEntry {
                memory_type: MemoryType::CopingPattern,
                content: "Walks outside when conversations get heavy".into(),
                confidence: 0.9,
            },
        ]);
        assert_eq!(
            pack.memory_moment(),
            Some("Walks outside when conversations get heavy")
        );

        let weak = MemoryPack::new(vec![PackEntry {
            memory_type: MemoryType::Goal,
            content: "Wants to set better boundaries at work".into(),
            confidence: 0.4,
        }]);
        assert_eq!(weak.memory_moment(), None);
    }

    #[test]
    fn test_memory_pack_transparent_serde() {
        let json = r#"[{"memory_type": "trigger", "content": "Sunday evenings feel heavy"}]"#;
        let pack: MemoryPack = serde_json::from_str(json).unwrap();
        assert_eq!(pack.entries.len(), 1);
        assert_eq!(pack.entries[0].memory_type, MemoryType::Trigger);
        assert!((pack.entries[0].confidence - 0.5).abs() < f32::EPSILON);
    }
}
