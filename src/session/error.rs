use thiserror::Error;

use crate::quiz::ExamCode;

/// Errors a student-facing session can surface.
///
/// Duplicate or late timer events are absorbed by the state machine and never
/// show up here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The exam code does not resolve to a quiz
    #[error("No exam found for code '{0}'")]
    NotFound(String),

    /// The quiz exists but cannot be run
    #[error("Exam {code} cannot be started: {reason}")]
    MalformedQuiz { code: ExamCode, reason: String },

    /// The quiz source failed
    #[error("Cannot start exam: quiz source unavailable ({0})")]
    SourceUnavailable(String),

    /// The quiz source did not answer in time
    #[error("Cannot start exam: loading timed out after {0} seconds")]
    LoadTimeout(u64),

    /// A command arrived in a state that does not accept it
    #[error("Session is {0}, expected {1}")]
    NotReady(&'static str, &'static str),

    /// The session has been shut down
    #[error("Session has been closed")]
    Closed,
}

impl SessionError {
    /// Load failures leave the session unable to move past loading
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::MalformedQuiz { .. }
                | Self::SourceUnavailable(_)
                | Self::LoadTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_distinguishable() {
        let not_found = SessionError::NotFound("99999".into());
        assert_eq!(not_found.to_string(), "No exam found for code '99999'");

        let malformed = SessionError::MalformedQuiz {
            code: ExamCode::parse("12345").unwrap(),
            reason: "quiz has no questions".into(),
        };
        assert_eq!(
            malformed.to_string(),
            "Exam 12345 cannot be started: quiz has no questions"
        );

        assert!(SessionError::LoadTimeout(10).to_string().contains("timed out"));
    }

    #[test]
    fn load_failure_classification() {
        assert!(SessionError::NotFound("1".into()).is_load_failure());
        assert!(SessionError::SourceUnavailable("down".into()).is_load_failure());
        assert!(SessionError::LoadTimeout(5).is_load_failure());
        assert!(!SessionError::Closed.is_load_failure());
        assert!(!SessionError::NotReady("waiting", "active").is_load_failure());
    }
}
