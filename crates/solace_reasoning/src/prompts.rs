//! Prompt builders for the generation passes.
//!
//! Pure functions from (mode, bucket, user state, memory pack, rotation
//! picks) to instruction text. Nothing here touches the network or the
//! store; the engine decides what to build and when.

use solace_core::{Bucket, MemoryPack, SupportMode, UserStateDigest};
use solace_memory::ConversationSnapshot;

use crate::rotation::{FormulationStyle, QuestionKind};

/// Phrases the reply must never contain. Checked case-insensitively by the
/// draft telemetry pass.
pub const FORBIDDEN_PHRASES: [&str; 5] = [
    "it sounds like",
    "it seems like",
    "maybe",
    "perhaps",
    "i wonder if",
];

pub const MAX_REPLY_WORDS: usize = 120;

/// Opening lines offered to the draft pass so consecutive replies do not
/// all start the same way. The engine picks one at random each turn; the
/// model is free to ignore it.
pub const VARIATION_OPENERS: [&str; 8] = [
    "That's a lot to carry.",
    "I'm right here.",
    "Let's take this slowly.",
    "Okay. One piece at a time.",
    "I hear you.",
    "There's no rush.",
    "That deserves some room.",
    "I'm glad you said it.",
];

const IDENTITY: &str = "You are Solace, a warm emotional-support companion. You speak like a \
close, grounded friend: plain words, short sentences, no clinical language, no therapy-speak.";

fn mode_tone(mode: SupportMode) -> &'static str {
    match mode {
        SupportMode::Reflect => {
            "Mirror what they are expressing and gently surface the feeling underneath it. \
             Help them hear themselves."
        }
        SupportMode::SitWithMe => {
            "Stay present and unhurried. Do not fix, reframe, or redirect; keep them company \
             inside the feeling."
        }
        SupportMode::Challenge => {
            "Offer one honest, caring push against the story they are telling themselves. \
             Direct but never harsh."
        }
        SupportMode::Decide => {
            "Help them weigh what actually matters to them. Structure beats sympathy here, \
             but stay warm."
        }
        SupportMode::JustListen => {
            "Receive what they share. Acknowledge briefly, never advise, never probe."
        }
    }
}

fn bucket_instruction(bucket: Bucket) -> &'static str {
    match bucket {
        Bucket::EmotionalProcessing => {
            "Name the feeling you hear with precision and give it room. One feeling, clearly \
             held, beats a list of them."
        }
        Bucket::PatternReflection => {
            "Connect what they said to the loop they keep describing, concretely and without \
             diagnosing them."
        }
        Bucket::SeekingPerspective => {
            "Offer one alternative way of seeing the situation. One frame, offered lightly, \
             not a lecture."
        }
        Bucket::Venting => {
            "Let the pressure out. Treat the frustration as legitimate before anything else."
        }
        Bucket::Reassurance => {
            "Steady them. Be specific about what they are managing, not generically soothing."
        }
        Bucket::DecisionMaking => {
            "Lay out the real tension between their options in their own terms. Do not pick \
             for them."
        }
        Bucket::PracticalAction => {
            "Ground the reply in one small, doable step they could actually take today."
        }
        Bucket::Crisis => {
            "Their safety comes before everything else. Acknowledge the pain directly, stay \
             with them, and gently point to immediate human support: a crisis line, a trusted \
             person nearby, or emergency services if they are in danger right now. Nothing \
             else matters in this reply."
        }
    }
}

/// System instruction for Pass A, the blocking draft.
pub fn build_draft_prompt(
    mode: SupportMode,
    bucket: Bucket,
    user_state: &UserStateDigest,
    snapshot: Option<&ConversationSnapshot>,
    pack: &MemoryPack,
    memory_moment: Option<&str>,
    opener: &str,
) -> String {
    let mut prompt = format!(
        "{}\n\nSupport mode: {}. {}\nWhat this message is asking for: {}. {}",
        IDENTITY,
        mode.label(),
        mode_tone(mode),
        bucket.label(),
        bucket_instruction(bucket)
    );

    if let Some(snapshot) = snapshot {
        prompt.push_str(&format!(
            "\n\nWhere the conversation has been:\n{}\nThreads that keep coming up: {}",
            snapshot.summary,
            snapshot.themes.join(", ")
        ));
    }

    if !user_state.is_empty() {
        prompt.push_str(&format!(
            "\n\nTheir recent emotional weather (for your awareness, never to quote back):\n{}",
            user_state.render()
        ));
    }

    if !pack.is_empty() {
        prompt.push_str(&format!(
            "\n\nWhat you know about this person:\n{}",
            pack.digest()
        ));
    }

    if let Some(moment) = memory_moment {
        prompt.push_str(&format!(
            "\n\nIf it fits naturally, you may reference this once: \"{}\". Never force it.",
            moment
        ));
    }

    prompt.push_str(&format!(
        "\n\nHARD CONSTRAINTS:\n\
         - At most {} words, in at most 3 short paragraphs.\n\
         - Never write \"it sounds like\" or \"it seems like\".\n\
         - Never hedge with \"maybe\", \"perhaps\", or \"I wonder if\".\n\
         - At most one question, and only at the very end.\n\
         - Vary how you open. One you could start with, if it fits: \"{}\".\n\
         - No bullet lists, no advice templates, no crisis-line boilerplate unless safety requires it.",
        MAX_REPLY_WORDS, opener
    ));

    prompt
}

/// System instruction for Pass B, the streamed rewrite. `end_in_statement`
/// replaces the question requirement for crisis turns and the quieter modes.
pub fn build_rewrite_prompt(
    mode: SupportMode,
    bucket: Bucket,
    style: FormulationStyle,
    question: QuestionKind,
    end_in_statement: bool,
) -> String {
    let closing = if end_in_statement {
        "End with a grounded statement. Do not ask any question.".to_string()
    } else {
        question.instruction().to_string()
    };

    format!(
        "{}\n\nYou drafted a reply in {} mode for a message asking for {}. Now rewrite it so \
         it lands the way a person would actually say it.\n\nREWRITE CHECKLIST:\n\
         - Keep the meaning and emotional core of the draft. Do not add new topics.\n\
         - {}\n\
         - {}\n\
         - Cut anything that reads like a template or a therapist's script.\n\
         - Never write \"it sounds like\", \"it seems like\", \"maybe\", \"perhaps\", or \
         \"I wonder if\".\n\
         - Stay under {} words.",
        IDENTITY,
        mode.label(),
        bucket.label(),
        style.instruction(),
        closing,
        MAX_REPLY_WORDS
    )
}

/// The user-role nudge appended after the draft in Pass B's message list.
pub const REWRITE_REQUEST: &str = "Rewrite your previous reply following your instructions. \
Keep what it says, change how it says it. Output only the rewritten reply.";

/// System instruction for the memory extraction pass.
pub fn build_extraction_prompt(pack: &MemoryPack) -> String {
    let known = if pack.is_empty() {
        "(nothing yet)".to_string()
    } else {
        pack.digest()
    };

    format!(
        "You extract durable facts about a person from one exchange of an emotional-support \
         conversation.\n\nRules:\n\
         - Return at most 3 memories, only ones likely to still matter in a month.\n\
         - memory_type must be one of: recurring_theme, trigger, coping_pattern, preference, \
         relationship_context, goal, boundary.\n\
         - content is one abstracted sentence, 120 characters or fewer. Never a verbatim \
         quote, never a name, never contact details or anything identifying.\n\
         - confidence is 0.0 to 1.0: stated directly = 0.8 or higher, implied = around 0.5.\n\
         - safety_level is normal, sensitive, or crisis_related.\n\
         - Skip greetings, small talk, and one-off moods. If nothing qualifies, return an \
         empty list.\n\nAlready known (do not repeat, but refinements are welcome):\n{}\n\n\
         Reply with JSON only:\n\
         {{\"memories\": [{{\"memory_type\": \"trigger\", \"content\": \"...\", \
         \"confidence\": 0.7, \"safety_level\": \"normal\"}}]}}",
        known
    )
}

/// System instruction for the continuity snapshot pass.
pub const SNAPSHOT_PROMPT: &str = "You maintain a rolling snapshot of an ongoing \
emotional-support conversation.\n\nFrom the exchange you are given, produce:\n\
- summary: 1-2 plain sentences describing where the conversation is emotionally.\n\
- themes: 1 to 3 short lowercase phrases naming what keeps coming up.\n\n\
Reply with JSON only:\n{\"summary\": \"...\", \"themes\": [\"...\"]}";

/// System instruction for the weekly narrative pass.
pub fn build_narrative_prompt(
    week_start: &str,
    week_end: &str,
    dominant_emotions: &[String],
    top_triggers: &[String],
    volatility_score: i64,
    recent_lines: &[String],
) -> String {
    format!(
        "You write a short weekly reflection for someone based on their check-ins from {} \
         to {}.\n\nWhat the week held:\n\
         - Emotions that showed up most: {}\n\
         - Situations that kept surfacing: {}\n\
         - Emotional variability: {} out of 100\n\n\
         Recent moments, newest first:\n{}\n\n\
         Write 100 to 150 words. Observational and warm, never clinical, never advice. Do \
         not address them as \"you\" in every sentence. No exclamation marks, no dashes. \
         End with one forward-looking sentence.",
        week_start,
        week_end,
        join_or_none(dominant_emotions),
        join_or_none(top_triggers),
        volatility_score,
        recent_lines.join("\n")
    )
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none recorded".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_prompt_includes_mode_and_bucket() {
        let prompt = build_draft_prompt(
            SupportMode::SitWithMe,
            Bucket::Venting,
            &UserStateDigest::default(),
            None,
            &MemoryPack::default(),
            None,
            "I hear you.",
        );
        assert!(prompt.contains("Sit with me"));
        assert!(prompt.contains("Venting"));
        assert!(prompt.contains("HARD CONSTRAINTS"));
        assert!(prompt.contains("\"I hear you.\""));
        // Empty context blocks are omitted entirely
        assert!(!prompt.contains("What you know about this person"));
        assert!(!prompt.contains("Where the conversation has been"));
    }

    #[test]
    fn test_draft_prompt_carries_context_blocks() {
        let snapshot = ConversationSnapshot {
            summary: "They are wrestling with a job decision.".to_string(),
            themes: vec!["work".to_string(), "self-trust".to_string()],
            last_updated: 0,
        };
        let digest = UserStateDigest {
            top_emotions: vec!["anxious".to_string()],
            ..Default::default()
        };
        let prompt = build_draft_prompt(
            SupportMode::Decide,
            Bucket::DecisionMaking,
            &digest,
            Some(&snapshot),
            &MemoryPack::default(),
            Some("Walks help settle thoughts"),
            VARIATION_OPENERS[0],
        );
        assert!(prompt.contains("wrestling with a job decision"));
        assert!(prompt.contains("work, self-trust"));
        assert!(prompt.contains("anxious"));
        assert!(prompt.contains("Walks help settle thoughts"));
    }

    #[test]
    fn test_rewrite_prompt_question_suppression() {
        let with_question = build_rewrite_prompt(
            SupportMode::Reflect,
            Bucket::EmotionalProcessing,
            FormulationStyle::Observation,
            QuestionKind::Feeling,
            false,
        );
        assert!(with_question.contains(QuestionKind::Feeling.instruction()));

        let statement_only = build_rewrite_prompt(
            SupportMode::JustListen,
            Bucket::Venting,
            FormulationStyle::Observation,
            QuestionKind::Feeling,
            true,
        );
        assert!(statement_only.contains("End with a grounded statement"));
        assert!(!statement_only.contains(QuestionKind::Feeling.instruction()));
    }

    #[test]
    fn test_extraction_prompt_lists_known_memories() {
        let prompt = build_extraction_prompt(&MemoryPack::default());
        assert!(prompt.contains("(nothing yet)"));
        assert!(prompt.contains("recurring_theme"));
        assert!(prompt.contains("120 characters"));
    }

    #[test]
    fn test_narrative_prompt_shape() {
        let prompt = build_narrative_prompt(
            "2026-08-17",
            "2026-08-23",
            &["anxious".to_string(), "tired".to_string()],
            &[],
            38,
            &["user: long day again".to_string()],
        );
        assert!(prompt.contains("2026-08-17"));
        assert!(prompt.contains("anxious, tired"));
        assert!(prompt.contains("none recorded"));
        assert!(prompt.contains("38 out of 100"));
        assert!(prompt.contains("forward-looking"));
    }
}
