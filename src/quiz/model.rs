use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Maximum length of an exam code
pub const MAX_CODE_LEN: usize = 32;

/// Default seconds each question stays on screen
pub const DEFAULT_TIME_PER_QUESTION: u32 = 25;

/// Exam code an instructor assigns to a quiz and a student types to join it.
///
/// Codes are normalized on construction: surrounding whitespace is trimmed,
/// purely numeric codes are kept as-is and anything else is uppercased, so
/// `math101` and `MATH101` refer to the same quiz.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExamCode(String);

impl ExamCode {
    /// Parse and normalize an exam code
    pub fn parse(raw: &str) -> Result<Self> {
        let code = Self::normalize(raw);

        if code.is_empty() {
            anyhow::bail!("Exam code cannot be empty");
        }

        if code.len() > MAX_CODE_LEN {
            anyhow::bail!(
                "Exam code is too long: expected at most {} characters, got {}",
                MAX_CODE_LEN,
                code.len()
            );
        }

        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Invalid exam code '{}': must contain only letters, digits and '-'",
                code
            );
        }

        if code.starts_with('-') || code.ends_with('-') {
            anyhow::bail!("Invalid exam code '{}': cannot start or end with '-'", code);
        }

        Ok(Self(code))
    }

    /// Normalize without validating
    pub fn normalize(raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            trimmed.to_string()
        } else {
            trimmed.to_uppercase()
        }
    }

    /// Generate a fresh code from the current timestamp (`QUIZ-123456`)
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis().to_string();
        let tail = &millis[millis.len().saturating_sub(6)..];
        Self(format!("QUIZ-{}", tail))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ExamCode {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ExamCode> for String {
    fn from(code: ExamCode) -> Self {
        code.0
    }
}

impl fmt::Display for ExamCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Question {
    /// Unique within its quiz
    pub id: String,

    /// Prompt shown to students
    pub question: String,

    /// Answer options, displayed as A, B, C, ...
    pub options: Vec<String>,

    /// Zero-based index into `options`
    pub correct_answer: usize,

    #[serde(default = "default_points")]
    pub points: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

fn default_points() -> u32 {
    1
}

impl Question {
    /// Letter label for an option index (0 -> 'A')
    pub fn option_label(index: usize) -> char {
        (b'A' + (index % 26) as u8) as char
    }

    /// Validate a single question
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("Question ID cannot be empty");
        }

        if self.question.trim().is_empty() {
            anyhow::bail!("Question text cannot be empty");
        }

        if self.options.len() < 2 {
            anyhow::bail!(
                "Question must have at least 2 options, got {}",
                self.options.len()
            );
        }

        if self.options.iter().any(|o| o.trim().is_empty()) {
            anyhow::bail!("Answer options cannot be empty");
        }

        if self.correct_answer >= self.options.len() {
            anyhow::bail!(
                "Correct answer index {} is out of range for {} options",
                self.correct_answer,
                self.options.len()
            );
        }

        if self.points == 0 {
            anyhow::bail!("Question must be worth at least 1 point");
        }

        Ok(())
    }
}

/// A quiz as configured by an instructor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Quiz {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Seconds each question is displayed
    #[serde(default = "default_time_per_question")]
    pub time_per_question: u32,

    pub exam_code: ExamCode,

    #[serde(default)]
    pub questions: Vec<Question>,

    /// Only meaningful to the instructor side; sessions ignore it
    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_time_per_question() -> u32 {
    DEFAULT_TIME_PER_QUESTION
}

fn default_true() -> bool {
    true
}

impl Quiz {
    /// Total points available
    pub fn total_points(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }

    pub fn find_question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Validate the quiz as a bank entry.
    ///
    /// A quiz without questions passes: it is a legal (if useless) entry
    /// that a session will refuse to load.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("Quiz ID cannot be empty");
        }

        if self.title.trim().is_empty() {
            anyhow::bail!("Quiz title cannot be empty");
        }

        if self.time_per_question == 0 {
            anyhow::bail!("Time per question must be at least 1 second");
        }

        let mut ids = HashSet::new();
        for question in &self.questions {
            if !ids.insert(question.id.as_str()) {
                anyhow::bail!("Duplicate question ID: {}", question.id);
            }

            question
                .validate()
                .with_context(|| format!("Invalid question '{}'", question.id))?;
        }

        Ok(())
    }
}
