//! Crisis and intent classification.
//!
//! Pure function from (message text, support mode) to a support bucket.
//! Crisis phrases override everything; otherwise each bucket allowed by the
//! active mode is scored against keyword pattern groups and the strictly
//! highest score wins, ties falling to the earliest bucket in the mode's
//! allowed list.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::SupportMode;

// ============================================================================
// Crisis phrases
// ============================================================================

/// Matched as case-insensitive substrings. Any hit forces `Bucket::Crisis`
/// regardless of mode.
const CRISIS_PHRASES: [&str; 9] = [
    "kill myself",
    "suicide",
    "end it all",
    "want to die",
    "self harm",
    "self-harm",
    "hurt myself",
    "not worth living",
    "better off dead",
];

// ============================================================================
// Keyword pattern tables
// ============================================================================

static VENTING_PRIMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)i (just )?need to (let|get) (this|it) out|vent|scream|ugh|frustrated|angry|furious|sick of")
        .unwrap()
});
static VENTING_SECONDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)can't take|had enough|exhausted|done with").unwrap());

static REASSURANCE_PRIMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)am i (wrong|okay|normal|overreacting)|is (this|it) (okay|normal)|tell me|reassure|worried")
        .unwrap()
});
static REASSURANCE_SECONDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)scared|afraid|anxious|nervous").unwrap());

static EMOTIONAL_PRIMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)feel(ing)?|emotion|sad|grief|loss|miss|heart|heavy|numb").unwrap()
});
static EMOTIONAL_SECONDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)overwhelm|cry|tears|hurt").unwrap());

static PATTERN_PRIMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)always|again|keep doing|pattern|cycle|repeat|every time|same thing").unwrap()
});
static PATTERN_SECONDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)notice|realize|wonder why i").unwrap());

static PERSPECTIVE_PRIMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)perspective|different way|another angle|think about this|make sense|understand")
        .unwrap()
});
static PERSPECTIVE_SECONDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)what do you think|how (should|would|do)").unwrap());

static DECISION_PRIMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)decide|decision|choose|option|should i|torn between|dilemma").unwrap()
});
static DECISION_SECONDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)pros and cons|trade.?off|either.*or").unwrap());

static ACTION_PRIMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)what (can|should) i do|next step|plan|action|strategy|how to (handle|deal|manage|fix|solve)")
        .unwrap()
});
static ACTION_SECONDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)advice|suggestion|recommend|tip").unwrap());

// ============================================================================
// Buckets
// ============================================================================

/// Support-intent label chosen per turn. Each non-crisis variant carries its
/// own scoring tables; `Crisis` is reached only through the phrase scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    EmotionalProcessing,
    PatternReflection,
    SeekingPerspective,
    Venting,
    Reassurance,
    DecisionMaking,
    PracticalAction,
    Crisis,
}

impl Bucket {
    pub fn label(self) -> &'static str {
        match self {
            Bucket::EmotionalProcessing => "Emotional Processing",
            Bucket::PatternReflection => "Pattern Reflection",
            Bucket::SeekingPerspective => "Seeking Perspective",
            Bucket::Venting => "Venting",
            Bucket::Reassurance => "Reassurance",
            Bucket::DecisionMaking => "Decision Making",
            Bucket::PracticalAction => "Practical Action",
            Bucket::Crisis => "Crisis",
        }
    }

    /// Keyword score for this bucket: 3 points per primary pattern hit,
    /// 2 per secondary.
    pub fn score(self, text: &str) -> u32 {
        let (primary, secondary) = match self {
            Bucket::EmotionalProcessing => (&*EMOTIONAL_PRIMARY, &*EMOTIONAL_SECONDARY),
            Bucket::PatternReflection => (&*PATTERN_PRIMARY, &*PATTERN_SECONDARY),
            Bucket::SeekingPerspective => (&*PERSPECTIVE_PRIMARY, &*PERSPECTIVE_SECONDARY),
            Bucket::Venting => (&*VENTING_PRIMARY, &*VENTING_SECONDARY),
            Bucket::Reassurance => (&*REASSURANCE_PRIMARY, &*REASSURANCE_SECONDARY),
            Bucket::DecisionMaking => (&*DECISION_PRIMARY, &*DECISION_SECONDARY),
            Bucket::PracticalAction => (&*ACTION_PRIMARY, &*ACTION_SECONDARY),
            // Crisis is reached by phrase scan, never by scoring.
            Bucket::Crisis => return 0,
        };
        let primary_hits = primary.find_iter(text).count() as u32;
        let secondary_hits = secondary.find_iter(text).count() as u32;
        primary_hits * 3 + secondary_hits * 2
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl SupportMode {
    /// Buckets this mode may resolve to, in tie-break priority order.
    /// `Crisis` is never listed; it overrides every mode.
    pub fn allowed_buckets(self) -> &'static [Bucket] {
        match self {
            SupportMode::Reflect => &[
                Bucket::EmotionalProcessing,
                Bucket::PatternReflection,
                Bucket::SeekingPerspective,
            ],
            SupportMode::SitWithMe => &[
                Bucket::Venting,
                Bucket::Reassurance,
                Bucket::EmotionalProcessing,
            ],
            SupportMode::Challenge => &[
                Bucket::SeekingPerspective,
                Bucket::PatternReflection,
                Bucket::DecisionMaking,
            ],
            SupportMode::Decide => &[
                Bucket::DecisionMaking,
                Bucket::PracticalAction,
                Bucket::SeekingPerspective,
            ],
            SupportMode::JustListen => &[Bucket::Venting, Bucket::Reassurance],
        }
    }
}

/// Classify one user message under the active support mode.
///
/// Deterministic and side-effect free. Crisis phrases are checked first;
/// otherwise the allowed buckets are scored and only a strictly higher score
/// displaces the current leader, so ties resolve to the earliest declared
/// bucket and an all-zero round returns the mode's first bucket.
pub fn classify(text: &str, mode: SupportMode) -> Bucket {
    let lowered = text.to_lowercase();
    if CRISIS_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return Bucket::Crisis;
    }

    let allowed = mode.allowed_buckets();
    let mut best = allowed[0];
    let mut best_score = best.score(text);
    for &bucket in &allowed[1..] {
        let score = bucket.score(text);
        if score > best_score {
            best = bucket;
            best_score = score;
        }
    }
    best
}
