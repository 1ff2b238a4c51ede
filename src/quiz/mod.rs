/// Quiz data and storage
///
/// This module provides:
/// - The question/quiz data model and its validation
/// - The in-memory repository sessions load quizzes from
/// - The YAML quiz bank instructors edit
/// - CSV bulk import of questions

pub mod bank;
pub mod import;
pub mod model;
pub mod repository;

pub use bank::{NewQuiz, QuestionUpdate, QuizBank, QuizUpdate};
pub use import::{CsvImport, RejectedRow, parse_questions_csv};
pub use model::{ExamCode, Question, Quiz};
pub use repository::{QuizRepository, QuizSource, shuffle_questions};
