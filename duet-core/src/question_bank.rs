use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use duet_types::{Question, RoomError};
use rand::seq::SliceRandom;
use tracing::{info, warn};

/// Source of question batches for a game
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    /// Draw up to `count` distinct questions from `category`.
    ///
    /// Returning fewer than requested is allowed; returning none is
    /// `NoQuestionsAvailable`.
    async fn fetch_questions(&self, category: &str, count: usize)
    -> Result<Vec<Question>, RoomError>;
}

/// In-process question bank loaded from JSON files
pub struct QuestionBank {
    by_category: HashMap<String, Vec<Question>>,
}

impl QuestionBank {
    /// Load questions from a JSON file or from every `.json` file in a
    /// directory. Each file holds an array of questions.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut questions = Vec::new();

        if path.is_dir() {
            let mut files: Vec<_> = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read question directory {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            files.sort();

            for file in files {
                questions.extend(Self::read_file(&file)?);
            }
        } else {
            questions = Self::read_file(path)?;
        }

        if questions.is_empty() {
            return Err(anyhow!("No questions found at {}", path.display()));
        }

        let bank = Self::from_questions(questions);
        info!(
            "Loaded question bank with {} categories from {}",
            bank.by_category.len(),
            path.display()
        );
        Ok(bank)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let questions: Vec<Question> =
            serde_json::from_str(json).context("Invalid question JSON")?;
        Ok(Self::from_questions(questions))
    }

    pub fn from_questions(questions: Vec<Question>) -> Self {
        let mut by_category: HashMap<String, Vec<Question>> = HashMap::new();
        for question in questions {
            by_category
                .entry(question.category.clone())
                .or_default()
                .push(question);
        }
        Self { by_category }
    }

    fn read_file(path: &Path) -> Result<Vec<Question>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid question JSON in {}", path.display()))
    }

    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<_> = self.by_category.keys().cloned().collect();
        categories.sort();
        categories
    }

    pub fn question_count(&self, category: &str) -> usize {
        self.by_category.get(category).map_or(0, Vec::len)
    }

    fn sample(&self, category: &str, count: usize) -> Vec<Question> {
        let Some(pool) = self.by_category.get(category) else {
            return Vec::new();
        };
        let mut rng = rand::thread_rng();
        pool.choose_multiple(&mut rng, count).cloned().collect()
    }
}

#[async_trait]
impl QuestionProvider for QuestionBank {
    async fn fetch_questions(
        &self,
        category: &str,
        count: usize,
    ) -> Result<Vec<Question>, RoomError> {
        let questions = self.sample(category, count);

        if questions.is_empty() {
            return Err(RoomError::NoQuestionsAvailable {
                category: category.to_string(),
            });
        }
        if questions.len() < count {
            warn!(
                category,
                requested = count,
                available = questions.len(),
                "Not enough questions in category, starting a shorter game"
            );
        }
        Ok(questions)
    }
}
