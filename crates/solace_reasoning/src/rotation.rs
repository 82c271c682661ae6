//! Anti-repetition rotation for the rewrite pass.
//!
//! Each conversation carries its own (formulation style, question kind)
//! state; consecutive turns in one conversation never repeat either choice,
//! while unrelated conversations rotate independently.

use std::collections::HashMap;

use tokio::sync::Mutex;
use uuid::Uuid;

/// How the rewritten reply should be shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormulationStyle {
    #[default]
    Observation,
    Validation,
    Mirroring,
    Companioning,
}

impl FormulationStyle {
    pub fn next(self) -> Self {
        match self {
            FormulationStyle::Observation => FormulationStyle::Validation,
            FormulationStyle::Validation => FormulationStyle::Mirroring,
            FormulationStyle::Mirroring => FormulationStyle::Companioning,
            FormulationStyle::Companioning => FormulationStyle::Observation,
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            FormulationStyle::Observation => {
                "Shape it as a calm observation of what is happening for them, concrete and \
                 in their world."
            }
            FormulationStyle::Validation => {
                "Shape it as warm validation: name what they are carrying and why carrying it \
                 makes sense."
            }
            FormulationStyle::Mirroring => {
                "Shape it by giving their own words back in a new arrangement that lets them \
                 hear themselves."
            }
            FormulationStyle::Companioning => {
                "Shape it as standing beside them in it, steady and unhurried, more presence \
                 than commentary."
            }
        }
    }
}

/// What kind of question, if any, closes the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuestionKind {
    #[default]
    Feeling,
    Meaning,
    Grounding,
    Forward,
}

impl QuestionKind {
    pub fn next(self) -> Self {
        match self {
            QuestionKind::Feeling => QuestionKind::Meaning,
            QuestionKind::Meaning => QuestionKind::Grounding,
            QuestionKind::Grounding => QuestionKind::Forward,
            QuestionKind::Forward => QuestionKind::Feeling,
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            QuestionKind::Feeling => {
                "Close with one soft question about what the feeling is like from the inside."
            }
            QuestionKind::Meaning => {
                "Close with one question about what this means to them."
            }
            QuestionKind::Grounding => {
                "Close with one small question that brings them back to right now."
            }
            QuestionKind::Forward => {
                "Close with one question about what they might want next, without pushing."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RotationState {
    style: FormulationStyle,
    question: QuestionKind,
}

/// Per-conversation rotation state. Keyed by conversation id so concurrent
/// users never influence each other's rotation.
#[derive(Debug, Default)]
pub struct RotationLedger {
    states: Mutex<HashMap<Uuid, RotationState>>,
}

impl RotationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next (style, question) pair for this conversation and record
    /// it. The pair always differs from the previous turn's in both parts.
    /// Called every turn, even when the question ends up suppressed, so the
    /// rotation keeps moving.
    pub async fn advance(&self, conversation_id: Uuid) -> (FormulationStyle, QuestionKind) {
        let mut states = self.states.lock().await;
        let next = match states.get(&conversation_id) {
            Some(prev) => RotationState {
                style: prev.style.next(),
                question: prev.question.next(),
            },
            None => RotationState::default(),
        };
        states.insert(conversation_id, next);
        (next.style, next.question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycles_never_repeat_immediately() {
        let mut style = FormulationStyle::default();
        for _ in 0..8 {
            assert_ne!(style, style.next());
            style = style.next();
        }
        let mut question = QuestionKind::default();
        for _ in 0..8 {
            assert_ne!(question, question.next());
            question = question.next();
        }
    }

    #[tokio::test]
    async fn test_consecutive_turns_differ_within_conversation() {
        let ledger = RotationLedger::new();
        let conversation = Uuid::new_v4();

        let mut prev = ledger.advance(conversation).await;
        for _ in 0..10 {
            let current = ledger.advance(conversation).await;
            assert_ne!(current.0, prev.0);
            assert_ne!(current.1, prev.1);
            prev = current;
        }
    }

    #[tokio::test]
    async fn test_conversations_rotate_independently() {
        let ledger = RotationLedger::new();
        let first = ledger.advance(Uuid::new_v4()).await;
        let second = ledger.advance(Uuid::new_v4()).await;
        // Fresh conversations start from the same point; no global state
        // bleeds between them.
        assert_eq!(first, second);
    }
}
