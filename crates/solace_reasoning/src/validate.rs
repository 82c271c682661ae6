//! Draft constraint telemetry.
//!
//! Computed on the Pass A draft after the rewrite stream is underway. A
//! violation is logged, never retried, and never blocks delivery.

use crate::prompts::{FORBIDDEN_PHRASES, MAX_REPLY_WORDS};

pub const MAX_REPLY_PARAGRAPHS: usize = 3;

#[derive(Debug, Clone)]
pub struct DraftReport {
    pub word_count: usize,
    pub question_marks: usize,
    pub paragraphs: usize,
    pub forbidden_hits: Vec<&'static str>,
}

impl DraftReport {
    pub fn is_clean(&self) -> bool {
        self.forbidden_hits.is_empty()
            && self.word_count <= MAX_REPLY_WORDS
            && self.paragraphs <= MAX_REPLY_PARAGRAPHS
            && self.question_marks <= 1
    }
}

pub fn inspect_draft(draft: &str) -> DraftReport {
    let lowered = draft.to_lowercase();
    let forbidden_hits = FORBIDDEN_PHRASES
        .iter()
        .copied()
        .filter(|phrase| lowered.contains(phrase))
        .collect();

    DraftReport {
        word_count: draft.split_whitespace().count(),
        question_marks: draft.matches('?').count(),
        paragraphs: draft
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .count(),
        forbidden_hits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_draft() {
        let report = inspect_draft(
            "That meeting took something out of you.\n\nWhat part of it is still with you now?",
        );
        assert!(report.is_clean());
        assert_eq!(report.paragraphs, 2);
        assert_eq!(report.question_marks, 1);
    }

    #[test]
    fn test_forbidden_phrases_are_case_insensitive() {
        let report = inspect_draft("It Sounds Like you had a rough day. Maybe rest?");
        assert_eq!(report.forbidden_hits, vec!["it sounds like", "maybe"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_word_ceiling() {
        let long_draft = "word ".repeat(MAX_REPLY_WORDS + 1);
        let report = inspect_draft(&long_draft);
        assert_eq!(report.word_count, MAX_REPLY_WORDS + 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_too_many_questions() {
        let report = inspect_draft("Are you okay? What happened? Who was there?");
        assert_eq!(report.question_marks, 3);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_paragraph_count_ignores_blank_runs() {
        let report = inspect_draft("one\n\n\n\ntwo");
        assert_eq!(report.paragraphs, 2);
    }
}
