use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::quiz::model::{DEFAULT_TIME_PER_QUESTION, ExamCode, Question, Quiz};

/// Sample bank shipped with the binary
pub const EXAMPLE_BANK: &str = include_str!("../../example-quiz-bank.yaml");

/// An instructor's collection of quizzes, stored as YAML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuizBank {
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
}

/// Fields an instructor provides when creating a quiz
#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub description: String,
    pub time_per_question: Option<u32>,
    pub exam_code: Option<String>,
}

/// Changes to an existing quiz; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct QuizUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_per_question: Option<u32>,
    pub exam_code: Option<String>,
}

/// Changes to an existing question; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct QuestionUpdate {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    /// Zero-based
    pub correct_answer: Option<usize>,
    pub points: Option<u32>,
    pub category: Option<String>,
}

impl QuizBank {
    /// Parse a bank from YAML and validate it
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let bank: QuizBank = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        validate_bank(&bank)?;
        Ok(bank)
    }

    /// The bundled sample bank
    pub fn sample() -> Result<Self> {
        Self::from_yaml_str(EXAMPLE_BANK).context("Bundled sample bank is invalid")
    }

    pub fn find(&self, code: &str) -> Option<&Quiz> {
        let code = ExamCode::parse(code).ok()?;
        self.quizzes.iter().find(|q| q.exam_code == code)
    }

    fn find_mut(&mut self, code: &str) -> Result<&mut Quiz> {
        let code = ExamCode::parse(code)?;
        self.quizzes
            .iter_mut()
            .find(|q| q.exam_code == code)
            .with_context(|| format!("Quiz not found: {}", code))
    }

    /// Create a quiz, generating an exam code when none is given
    pub fn create_quiz(&mut self, new: NewQuiz) -> Result<&Quiz> {
        let exam_code = match new.exam_code.as_deref() {
            Some(raw) if !raw.trim().is_empty() => ExamCode::parse(raw)?,
            _ => ExamCode::generate(),
        };

        if self.quizzes.iter().any(|q| q.exam_code == exam_code) {
            anyhow::bail!("A quiz with exam code '{}' already exists", exam_code);
        }

        let quiz = Quiz {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            description: new.description,
            time_per_question: new.time_per_question.unwrap_or(DEFAULT_TIME_PER_QUESTION),
            exam_code,
            questions: Vec::new(),
            is_active: false,
            created_at: Utc::now(),
        };
        quiz.validate()?;

        info!("Created quiz '{}' with exam code {}", quiz.title, quiz.exam_code);
        self.quizzes.push(quiz);
        self.quizzes.last().context("Quiz vanished after insert")
    }

    /// Edit a quiz's details, returning its (possibly new) exam code.
    ///
    /// Questions, the active flag and the ID are kept.
    pub fn update_quiz(&mut self, code: &str, update: QuizUpdate) -> Result<ExamCode> {
        let current = ExamCode::parse(code)?;
        let pos = self
            .quizzes
            .iter()
            .position(|q| q.exam_code == current)
            .with_context(|| format!("Quiz not found: {}", current))?;

        let mut quiz = self.quizzes[pos].clone();
        if let Some(title) = update.title {
            quiz.title = title;
        }
        if let Some(description) = update.description {
            quiz.description = description;
        }
        if let Some(time) = update.time_per_question {
            quiz.time_per_question = time;
        }
        if let Some(raw) = update.exam_code {
            let new_code = ExamCode::parse(&raw)?;
            if new_code != current && self.quizzes.iter().any(|q| q.exam_code == new_code) {
                anyhow::bail!("A quiz with exam code '{}' already exists", new_code);
            }
            quiz.exam_code = new_code;
        }
        quiz.validate()?;

        info!("Updated quiz '{}' ({})", quiz.title, quiz.exam_code);
        let new_code = quiz.exam_code.clone();
        self.quizzes[pos] = quiz;
        Ok(new_code)
    }

    /// Remove a quiz and return it
    pub fn delete_quiz(&mut self, code: &str) -> Result<Quiz> {
        let code = ExamCode::parse(code)?;
        let pos = self
            .quizzes
            .iter()
            .position(|q| q.exam_code == code)
            .with_context(|| format!("Quiz not found: {}", code))?;
        Ok(self.quizzes.remove(pos))
    }

    /// Flip the active flag, returning the new value
    pub fn toggle_active(&mut self, code: &str) -> Result<bool> {
        let quiz = self.find_mut(code)?;
        quiz.is_active = !quiz.is_active;
        Ok(quiz.is_active)
    }

    /// Add a question, assigning a fresh ID
    pub fn add_question(&mut self, code: &str, mut question: Question) -> Result<String> {
        let quiz = self.find_mut(code)?;
        question.id = Uuid::new_v4().to_string();
        question.validate()?;

        let id = question.id.clone();
        quiz.questions.push(question);
        Ok(id)
    }

    /// Replace a question's content, keeping its ID
    pub fn update_question(&mut self, code: &str, id: &str, mut question: Question) -> Result<()> {
        let quiz = self.find_mut(code)?;
        let slot = quiz
            .questions
            .iter_mut()
            .find(|q| q.id == id)
            .with_context(|| format!("Question not found: {}", id))?;

        question.id = id.to_string();
        question.validate()?;
        *slot = question;
        Ok(())
    }

    /// Apply partial changes to a question
    pub fn edit_question(&mut self, code: &str, id: &str, update: QuestionUpdate) -> Result<()> {
        let mut question = self
            .find_mut(code)?
            .find_question(id)
            .cloned()
            .with_context(|| format!("Question not found: {}", id))?;

        if let Some(text) = update.question {
            question.question = text;
        }
        if let Some(options) = update.options {
            question.options = options;
        }
        if let Some(correct) = update.correct_answer {
            question.correct_answer = correct;
        }
        if let Some(points) = update.points {
            question.points = points;
        }
        if let Some(category) = update.category {
            question.category = Some(category).filter(|c| !c.trim().is_empty());
        }

        self.update_question(code, id, question)
    }

    pub fn delete_question(&mut self, code: &str, id: &str) -> Result<()> {
        let quiz = self.find_mut(code)?;
        let before = quiz.questions.len();
        quiz.questions.retain(|q| q.id != id);
        if quiz.questions.len() == before {
            anyhow::bail!("Question not found: {}", id);
        }
        Ok(())
    }

    /// Append imported questions, each with a fresh ID
    pub fn append_questions(&mut self, code: &str, mut questions: Vec<Question>) -> Result<usize> {
        let quiz = self.find_mut(code)?;
        for question in &mut questions {
            question.id = Uuid::new_v4().to_string();
            question.validate()?;
        }

        let count = questions.len();
        quiz.questions.extend(questions);
        Ok(count)
    }
}

/// Validate a whole bank
pub fn validate_bank(bank: &QuizBank) -> Result<()> {
    let mut ids = HashSet::new();
    let mut codes = HashSet::new();

    for quiz in &bank.quizzes {
        if !ids.insert(quiz.id.as_str()) {
            anyhow::bail!("Duplicate quiz ID: {}", quiz.id);
        }

        if !codes.insert(&quiz.exam_code) {
            anyhow::bail!("Duplicate exam code: {}", quiz.exam_code);
        }

        quiz.validate()
            .with_context(|| format!("Invalid quiz '{}'", quiz.title))?;
    }

    Ok(())
}

/// Default bank location in the user's data directory
pub fn get_bank_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "quickquest")
        .context("Could not determine data directory")?;

    let mut path = dirs.data_local_dir().to_path_buf();
    path.push("quiz-bank.yaml");
    Ok(path)
}

/// Load a bank from a YAML file
pub fn load_bank(path: &Path) -> Result<QuizBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read quiz bank: {}", path.display()))?;

    QuizBank::from_yaml_str(&content)
        .with_context(|| format!("Failed to load quiz bank: {}", path.display()))
}

/// Save a bank to a YAML file
pub fn save_bank(path: &Path, bank: &QuizBank) -> Result<()> {
    validate_bank(bank)?;

    let content = serde_yaml::to_string(bank).context("Failed to serialize quiz bank to YAML")?;

    crate::platform::common::atomic_write(path, content.as_bytes())
        .with_context(|| format!("Failed to write quiz bank: {}", path.display()))?;

    crate::platform::common::restrict_to_owner(path)?;

    Ok(())
}
