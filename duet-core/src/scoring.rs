use duet_types::{Locale, Question, SubmittedAnswer};
use tracing::warn;

pub struct ScoringEngine;

impl ScoringEngine {
    /// Map a raw answer onto the question's canonical choice.
    ///
    /// Locales are searched in `Locale::PRECEDENCE` order and the first hit
    /// wins. Free-form questions, and fixed-choice answers that match
    /// nothing, keep the raw string.
    pub fn canonicalize_answer(question: &Question, raw: &str) -> SubmittedAnswer {
        let Some(choices) = question.choices() else {
            return SubmittedAnswer::Raw(raw.to_string());
        };

        let needle = raw.trim().to_lowercase();
        for locale in Locale::PRECEDENCE {
            let position = choices
                .for_locale(locale)
                .iter()
                .position(|choice| choice.trim().to_lowercase() == needle);

            if let Some(canonical) = position.and_then(|index| choices.localized_at(index)) {
                return SubmittedAnswer::Canonical(canonical);
            }
        }

        warn!(
            question_id = %question.id,
            answer = %raw,
            "Answer did not match any predefined choice, storing raw text"
        );
        SubmittedAnswer::Raw(raw.to_string())
    }

    /// Two raw answers match on exact text, two canonical answers match on
    /// their primary-locale text, and mixed representations never match.
    pub fn answers_match(first: &SubmittedAnswer, second: &SubmittedAnswer) -> bool {
        match (first, second) {
            (SubmittedAnswer::Raw(a), SubmittedAnswer::Raw(b)) => a == b,
            (SubmittedAnswer::Canonical(a), SubmittedAnswer::Canonical(b)) => {
                a.get(Locale::PRIMARY) == b.get(Locale::PRIMARY)
            }
            _ => false,
        }
    }

    /// Rounded share of matched rounds, 0 when nothing was answered yet
    pub fn percentage(match_score: u32, total_questions_answered: u32) -> u32 {
        if total_questions_answered == 0 {
            return 0;
        }
        let ratio = f64::from(match_score) / f64::from(total_questions_answered);
        ((ratio * 100.0).round() as u32).min(100)
    }
}
