use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::quiz::{ExamCode, Question};
use crate::session::error::SessionError;

/// Lifecycle of one student's exam attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamState {
    /// Waiting for the quiz to arrive
    Loading,
    /// Loading failed; terminal
    Failed,
    /// Quiz loaded, student has not started
    Waiting,
    /// A question is displayed and its countdown runs
    Active,
    /// Every question has been shown; terminal
    Completed,
}

impl ExamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamState::Loading => "loading",
            ExamState::Failed => "failed",
            ExamState::Waiting => "waiting",
            ExamState::Active => "active",
            ExamState::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExamState::Failed | ExamState::Completed)
    }
}

impl fmt::Display for ExamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What triggered an advance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceTrigger {
    /// The countdown reached zero
    Expired,
    /// Operator override
    Forced,
}

/// Why an advance request did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// No question is on screen
    NotActive,
    /// An expiry event arrived while time was still left
    TimeRemaining,
    /// Another transition held the lock
    Busy,
    /// The session has been shut down
    Closed,
}

/// Result of an advance request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved on to the question at this index
    Advanced(usize),
    /// The last question expired
    Completed,
    Ignored(Ignored),
}

/// Result of one clock tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Countdown decremented, time left
    Counting(u32),
    /// Countdown frozen by the operator
    Paused,
    /// Countdown hit zero and the session advanced or completed
    Transitioned(AdvanceOutcome),
    /// Clock should stop: the session is no longer active
    Stopped,
}

/// Notification emitted on every transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Loaded { total_questions: usize },
    LoadFailed(SessionError),
    Started,
    Advanced { index: usize },
    Completed,
    Paused,
    Resumed,
    Closed,
}

/// Read-only snapshot handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub state: ExamState,
    pub student_name: String,
    pub exam_code: String,
    pub joined_at: DateTime<Utc>,
    pub quiz_title: Option<String>,
    /// Zero-based index of the question on screen
    pub current_index: usize,
    pub total_questions: usize,
    pub remaining_time: u32,
    pub time_per_question: u32,
    pub current_question: Option<Question>,
    /// Countdown is at or below the low-time threshold
    pub low_time: bool,
    pub paused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionView {
    /// One-based question number for display
    pub fn question_number(&self) -> usize {
        self.current_index + 1
    }

    /// Share of the countdown remaining, 0.0 to 1.0
    pub fn time_fraction(&self) -> f64 {
        if self.time_per_question == 0 {
            return 0.0;
        }
        f64::from(self.remaining_time) / f64::from(self.time_per_question)
    }
}

/// Code as typed, normalized when possible, for display before a quiz loads
pub(crate) fn display_code(raw: &str) -> String {
    ExamCode::parse(raw)
        .map(|c| c.to_string())
        .unwrap_or_else(|_| raw.trim().to_string())
}
