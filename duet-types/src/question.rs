use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Locales carried by question text and answer choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Locale {
    En,
    Tr,
    Es,
}

impl Locale {
    /// Locale whose text decides whether two canonical answers match
    pub const PRIMARY: Locale = Locale::En;

    /// Order in which choice lists are searched during canonicalization
    pub const PRECEDENCE: [Locale; 3] = [Locale::En, Locale::Tr, Locale::Es];
}

/// One piece of text in every supported locale
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LocalizedText {
    pub en: String,
    #[serde(default)]
    pub tr: String,
    #[serde(default)]
    pub es: String,
}

impl LocalizedText {
    pub fn get(&self, locale: Locale) -> &str {
        match locale {
            Locale::En => &self.en,
            Locale::Tr => &self.tr,
            Locale::Es => &self.es,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum QuestionText {
    Plain(String),
    Localized(LocalizedText),
}

/// Fixed-choice answer lists, index-aligned across locales
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AnswerChoices {
    #[serde(default)]
    pub en: Vec<String>,
    #[serde(default)]
    pub tr: Vec<String>,
    #[serde(default)]
    pub es: Vec<String>,
}

impl AnswerChoices {
    pub fn for_locale(&self, locale: Locale) -> &[String] {
        match locale {
            Locale::En => &self.en,
            Locale::Tr => &self.tr,
            Locale::Es => &self.es,
        }
    }

    /// Builds the full multi-locale record for the choice at `index`.
    /// Locales shorter than `index` fall back to the English text.
    pub fn localized_at(&self, index: usize) -> Option<LocalizedText> {
        let en = self.en.get(index).cloned();
        let tr = self.tr.get(index).cloned();
        let es = self.es.get(index).cloned();
        let fallback = en.clone().or_else(|| tr.clone()).or_else(|| es.clone())?;

        Some(LocalizedText {
            en: en.unwrap_or_else(|| fallback.clone()),
            tr: tr.unwrap_or_else(|| fallback.clone()),
            es: es.unwrap_or(fallback),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Question {
    pub id: String,
    pub text: QuestionText,
    pub category: String,
    #[serde(default)]
    pub have_answers: bool,
    #[serde(default)]
    pub answers: Option<AnswerChoices>,
}

impl Question {
    /// Answer choices, present only for fixed-choice questions
    pub fn choices(&self) -> Option<&AnswerChoices> {
        if self.have_answers {
            self.answers.as_ref()
        } else {
            None
        }
    }
}

/// A player's submitted answer as stored in a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum SubmittedAnswer {
    Raw(String),
    Canonical(LocalizedText),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submitted_answer_wire_shapes() {
        let raw: SubmittedAnswer = serde_json::from_str("\"yes\"").unwrap();
        assert_eq!(raw, SubmittedAnswer::Raw("yes".to_string()));

        let canonical: SubmittedAnswer =
            serde_json::from_str(r#"{"en":"Cat","tr":"Kedi","es":"Gato"}"#).unwrap();
        match canonical {
            SubmittedAnswer::Canonical(text) => assert_eq!(text.get(Locale::Tr), "Kedi"),
            other => panic!("Expected canonical answer, got {:?}", other),
        }
    }

    #[test]
    fn test_localized_at_fills_missing_locales() {
        let choices = AnswerChoices {
            en: vec!["Cat".to_string(), "Dog".to_string()],
            tr: vec!["Kedi".to_string()],
            es: vec![],
        };

        let dog = choices.localized_at(1).unwrap();
        assert_eq!(dog.en, "Dog");
        assert_eq!(dog.tr, "Dog");
        assert_eq!(dog.es, "Dog");
        assert!(choices.localized_at(2).is_none());
    }

    #[test]
    fn test_choices_hidden_for_free_form_questions() {
        let question = Question {
            id: "q1".to_string(),
            text: QuestionText::Plain("Do you like tea?".to_string()),
            category: "general".to_string(),
            have_answers: false,
            answers: Some(AnswerChoices::default()),
        };
        assert!(question.choices().is_none());
    }
}
