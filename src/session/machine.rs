use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::quiz::{ExamCode, Question, Quiz};
use crate::session::error::SessionError;
use crate::session::state::{
    AdvanceOutcome, AdvanceTrigger, ExamState, Ignored, SessionView, TickOutcome, display_code,
};

/// Default countdown value at which the view flags low time
pub const DEFAULT_LOW_TIME_THRESHOLD: u32 = 5;

/// Quiz data frozen for the lifetime of a session
#[derive(Debug, Clone)]
struct LoadedQuiz {
    title: String,
    code: ExamCode,
    time_per_question: u32,
    questions: Arc<[Question]>,
}

/// One student's exam attempt.
///
/// Every transition takes `&mut self`, so whoever owns the session (or holds
/// the mutex around it) performs the "time is up, not the last question,
/// move on" check and the increment as one step. A second expiry for the
/// same question finds a freshly reset countdown and does nothing.
#[derive(Debug)]
pub struct ExamSession {
    id: Uuid,
    student_name: String,
    requested_code: String,
    joined_at: DateTime<Utc>,
    state: ExamState,
    quiz: Option<LoadedQuiz>,
    current_index: usize,
    remaining_time: u32,
    paused: bool,
    closed: bool,
    low_time_threshold: u32,
    error: Option<SessionError>,
}

impl ExamSession {
    /// Create a session in `Loading` for a student and the code they entered
    pub fn new(student_name: &str, exam_code: &str) -> Self {
        let student_name = match student_name.trim() {
            "" => "Student".to_string(),
            name => name.to_string(),
        };

        Self {
            id: Uuid::new_v4(),
            student_name,
            requested_code: exam_code.to_string(),
            joined_at: Utc::now(),
            state: ExamState::Loading,
            quiz: None,
            current_index: 0,
            remaining_time: 0,
            paused: false,
            closed: false,
            low_time_threshold: DEFAULT_LOW_TIME_THRESHOLD,
            error: None,
        }
    }

    pub fn with_low_time_threshold(mut self, threshold: u32) -> Self {
        self.low_time_threshold = threshold;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ExamState {
        self.state
    }

    pub fn requested_code(&self) -> &str {
        &self.requested_code
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn remaining_time(&self) -> u32 {
        self.remaining_time
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// The session's question order (empty until loaded)
    pub fn questions(&self) -> &[Question] {
        self.quiz.as_ref().map(|q| &q.questions[..]).unwrap_or(&[])
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            ExamState::Active => self.questions().get(self.current_index),
            _ => None,
        }
    }

    fn time_per_question(&self) -> u32 {
        self.quiz.as_ref().map(|q| q.time_per_question).unwrap_or(0)
    }

    fn total_questions(&self) -> usize {
        self.questions().len()
    }

    /// Countdown at or below the low-time threshold while a question is shown
    pub fn is_low_time(&self) -> bool {
        self.state == ExamState::Active && self.remaining_time <= self.low_time_threshold
    }

    /// Apply the result of the quiz lookup: `Loading -> Waiting`, or
    /// `Loading -> Failed` with the reason.
    ///
    /// `shuffle` is called once; its order is kept for the whole session.
    pub fn resolve<F>(
        &mut self,
        lookup: Result<Option<Quiz>, SessionError>,
        shuffle: F,
    ) -> Result<(), SessionError>
    where
        F: FnOnce(&[Question]) -> Vec<Question>,
    {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if self.state != ExamState::Loading {
            return Err(SessionError::NotReady(self.state.as_str(), "loading"));
        }

        let loaded = lookup.and_then(|found| {
            let quiz = found.ok_or_else(|| SessionError::NotFound(display_code(&self.requested_code)))?;
            Self::check_runnable(&quiz)?;

            let questions = shuffle(&quiz.questions);
            if questions.len() != quiz.questions.len() {
                return Err(SessionError::MalformedQuiz {
                    code: quiz.exam_code.clone(),
                    reason: "question order lost questions".to_string(),
                });
            }

            Ok(LoadedQuiz {
                title: quiz.title,
                code: quiz.exam_code,
                time_per_question: quiz.time_per_question,
                questions: questions.into(),
            })
        });

        match loaded {
            Ok(quiz) => {
                info!(
                    "Loaded quiz '{}' ({} questions, {}s each) for {}",
                    quiz.title,
                    quiz.questions.len(),
                    quiz.time_per_question,
                    self.student_name
                );
                self.remaining_time = quiz.time_per_question;
                self.quiz = Some(quiz);
                self.state = ExamState::Waiting;
                Ok(())
            }
            Err(e) => {
                self.state = ExamState::Failed;
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Zero questions or a zero countdown cannot be run
    fn check_runnable(quiz: &Quiz) -> Result<(), SessionError> {
        let malformed = |reason: String| SessionError::MalformedQuiz {
            code: quiz.exam_code.clone(),
            reason,
        };

        if quiz.questions.is_empty() {
            return Err(malformed("quiz has no questions".to_string()));
        }
        if quiz.time_per_question == 0 {
            return Err(malformed("time per question must be positive".to_string()));
        }
        quiz.validate().map_err(|e| malformed(format!("{:#}", e)))
    }

    /// `Waiting -> Active` on the student's start signal
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }

        match self.state {
            ExamState::Waiting => {
                self.current_index = 0;
                self.remaining_time = self.time_per_question();
                self.state = ExamState::Active;
                info!("Exam started for {}", self.student_name);
                Ok(())
            }
            ExamState::Failed => Err(self
                .error
                .clone()
                .unwrap_or(SessionError::NotReady("failed", "waiting"))),
            other => Err(SessionError::NotReady(other.as_str(), "waiting")),
        }
    }

    /// One second of the countdown.
    ///
    /// Reaching exactly zero fires the expiry transition in the same step.
    pub fn tick(&mut self) -> TickOutcome {
        if self.closed || self.state != ExamState::Active {
            return TickOutcome::Stopped;
        }
        if self.paused {
            return TickOutcome::Paused;
        }

        self.remaining_time = self.remaining_time.saturating_sub(1);
        if self.remaining_time == 0 {
            TickOutcome::Transitioned(self.advance(AdvanceTrigger::Expired))
        } else {
            TickOutcome::Counting(self.remaining_time)
        }
    }

    /// "Time reached zero" event
    pub fn expire(&mut self) -> AdvanceOutcome {
        self.advance(AdvanceTrigger::Expired)
    }

    /// Operator override: same transition as expiry, without waiting
    pub fn force_advance(&mut self) -> AdvanceOutcome {
        self.advance(AdvanceTrigger::Forced)
    }

    fn advance(&mut self, trigger: AdvanceTrigger) -> AdvanceOutcome {
        if self.closed {
            return AdvanceOutcome::Ignored(Ignored::Closed);
        }
        if self.state != ExamState::Active {
            debug!("Advance ({:?}) ignored in state {}", trigger, self.state);
            return AdvanceOutcome::Ignored(Ignored::NotActive);
        }
        if trigger == AdvanceTrigger::Expired && self.remaining_time > 0 {
            debug!("Stale expiry ignored with {}s left", self.remaining_time);
            return AdvanceOutcome::Ignored(Ignored::TimeRemaining);
        }

        let total = self.total_questions();
        if self.current_index + 1 < total {
            self.current_index += 1;
            self.remaining_time = self.time_per_question();
            info!(
                "Question {}/{} ({:?})",
                self.current_index + 1,
                total,
                trigger
            );
            AdvanceOutcome::Advanced(self.current_index)
        } else {
            self.state = ExamState::Completed;
            self.remaining_time = 0;
            self.paused = false;
            info!("Exam completed for {} ({} questions)", self.student_name, total);
            AdvanceOutcome::Completed
        }
    }

    /// Freeze the countdown; returns whether anything changed
    pub fn pause(&mut self) -> Result<bool, SessionError> {
        self.require_active()?;
        let changed = !self.paused;
        self.paused = true;
        Ok(changed)
    }

    /// Unfreeze the countdown; returns whether anything changed
    pub fn resume(&mut self) -> Result<bool, SessionError> {
        self.require_active()?;
        let changed = self.paused;
        self.paused = false;
        Ok(changed)
    }

    fn require_active(&self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if self.state != ExamState::Active {
            return Err(SessionError::NotReady(self.state.as_str(), "active"));
        }
        Ok(())
    }

    /// Tear the session down; every later command is a no-op or error
    pub fn close(&mut self) -> bool {
        let changed = !self.closed;
        self.closed = true;
        changed
    }

    /// Snapshot for rendering
    pub fn view(&self) -> SessionView {
        let exam_code = match &self.quiz {
            Some(quiz) => quiz.code.to_string(),
            None => display_code(&self.requested_code),
        };

        SessionView {
            session_id: self.id,
            state: self.state,
            student_name: self.student_name.clone(),
            exam_code,
            joined_at: self.joined_at,
            quiz_title: self.quiz.as_ref().map(|q| q.title.clone()),
            current_index: self.current_index,
            total_questions: self.total_questions(),
            remaining_time: self.remaining_time,
            time_per_question: self.time_per_question(),
            current_question: self.current_question().cloned(),
            low_time: self.is_low_time(),
            paused: self.paused,
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::model::tests::make_quiz;

    fn identity(questions: &[Question]) -> Vec<Question> {
        questions.to_vec()
    }

    fn loaded(questions: usize, time: u32) -> ExamSession {
        let mut session = ExamSession::new("Ada", "12345");
        session
            .resolve(Ok(Some(make_quiz("12345", questions, time))), identity)
            .unwrap();
        session
    }

    fn active(questions: usize, time: u32) -> ExamSession {
        let mut session = loaded(questions, time);
        session.start().unwrap();
        session
    }

    #[test]
    fn new_session_is_loading() {
        let session = ExamSession::new("  ", "math101");
        assert_eq!(session.state(), ExamState::Loading);

        let view = session.view();
        assert_eq!(view.student_name, "Student");
        assert_eq!(view.exam_code, "MATH101");
        assert_eq!(view.total_questions, 0);
        assert!(view.current_question.is_none());
        assert!(view.quiz_title.is_none());
    }

    #[test]
    fn resolve_moves_to_waiting_with_full_countdown() {
        let session = loaded(5, 25);
        assert_eq!(session.state(), ExamState::Waiting);
        assert_eq!(session.remaining_time(), 25);
        assert_eq!(session.questions().len(), 5);
        assert!(session.current_question().is_none());
    }

    #[test]
    fn resolve_uses_shuffled_order() {
        let mut session = ExamSession::new("Ada", "12345");
        session
            .resolve(Ok(Some(make_quiz("12345", 3, 25))), |qs| {
                qs.iter().rev().cloned().collect()
            })
            .unwrap();

        let ids: Vec<&str> = session.questions().iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q3", "q2", "q1"]);
    }

    #[test]
    fn resolve_rejects_shuffle_that_drops_questions() {
        let mut session = ExamSession::new("Ada", "12345");
        let result = session.resolve(Ok(Some(make_quiz("12345", 3, 25))), |qs| qs[..1].to_vec());
        assert!(matches!(result, Err(SessionError::MalformedQuiz { .. })));
    }

    #[test]
    fn not_found_fails_the_session() {
        let mut session = ExamSession::new("Ada", "99999");
        let err = session.resolve(Ok(None), identity).unwrap_err();

        assert_eq!(err, SessionError::NotFound("99999".into()));
        assert_eq!(session.state(), ExamState::Failed);
        assert_eq!(session.start().unwrap_err(), err);
        assert!(session.view().error.is_some());
    }

    #[test]
    fn source_errors_fail_the_session() {
        let mut session = ExamSession::new("Ada", "12345");
        let err = session
            .resolve(Err(SessionError::LoadTimeout(10)), identity)
            .unwrap_err();
        assert_eq!(err, SessionError::LoadTimeout(10));
        assert_eq!(session.state(), ExamState::Failed);
    }

    #[test]
    fn empty_quiz_never_becomes_active() {
        let mut session = ExamSession::new("Ada", "12345");
        let err = session
            .resolve(Ok(Some(make_quiz("12345", 0, 25))), identity)
            .unwrap_err();
        assert!(matches!(err, SessionError::MalformedQuiz { .. }));

        let start_err = session.start().unwrap_err();
        assert_eq!(start_err, err);
        assert_eq!(session.state(), ExamState::Failed);
    }

    #[test]
    fn zero_time_quiz_is_malformed() {
        let mut session = ExamSession::new("Ada", "12345");
        let err = session
            .resolve(Ok(Some(make_quiz("12345", 2, 0))), identity)
            .unwrap_err();
        assert!(matches!(err, SessionError::MalformedQuiz { .. }));
    }

    #[test]
    fn resolve_only_once() {
        let mut session = loaded(2, 10);
        let again = session.resolve(Ok(Some(make_quiz("12345", 4, 10))), identity);
        assert_eq!(again, Err(SessionError::NotReady("waiting", "loading")));
        assert_eq!(session.questions().len(), 2);
    }

    #[test]
    fn start_resets_index_and_countdown() {
        let session = active(3, 10);
        assert_eq!(session.state(), ExamState::Active);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.remaining_time(), 10);
        assert_eq!(session.current_question().unwrap().id, "q1");
    }

    #[test]
    fn start_requires_waiting() {
        let mut loading = ExamSession::new("Ada", "12345");
        assert_eq!(
            loading.start(),
            Err(SessionError::NotReady("loading", "waiting"))
        );

        let mut session = active(2, 10);
        assert_eq!(session.start(), Err(SessionError::NotReady("active", "waiting")));
    }

    #[test]
    fn tick_counts_down_to_expiry() {
        let mut session = active(2, 3);
        assert_eq!(session.tick(), TickOutcome::Counting(2));
        assert_eq!(session.tick(), TickOutcome::Counting(1));
        assert_eq!(
            session.tick(),
            TickOutcome::Transitioned(AdvanceOutcome::Advanced(1))
        );
        assert_eq!(session.remaining_time(), 3);
    }

    #[test]
    fn natural_expiry_visits_every_question_once() {
        for n in 1..=6 {
            let time = 4;
            let mut session = active(n, time);
            let mut visited = vec![session.current_index()];

            let mut ticks = 0;
            while session.state() == ExamState::Active {
                let outcome = session.tick();
                ticks += 1;
                if let TickOutcome::Transitioned(AdvanceOutcome::Advanced(index)) = outcome {
                    assert_eq!(session.remaining_time(), time);
                    visited.push(index);
                }
                assert!(session.current_index() < n);
            }

            assert_eq!(session.state(), ExamState::Completed);
            assert_eq!(visited, (0..n).collect::<Vec<_>>());
            assert_eq!(ticks, n * time as usize);
            assert_eq!(session.tick(), TickOutcome::Stopped);
        }
    }

    #[test]
    fn single_question_completes_directly() {
        let mut session = active(1, 2);
        assert_eq!(session.tick(), TickOutcome::Counting(1));
        assert_eq!(
            session.tick(),
            TickOutcome::Transitioned(AdvanceOutcome::Completed)
        );
        assert_eq!(session.state(), ExamState::Completed);
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn duplicate_expiry_advances_once() {
        let mut session = active(3, 2);
        session.tick();
        assert_eq!(
            session.tick(),
            TickOutcome::Transitioned(AdvanceOutcome::Advanced(1))
        );

        // A second "reached zero" for the same question lands on a fresh countdown
        assert_eq!(session.expire(), AdvanceOutcome::Ignored(Ignored::TimeRemaining));
        assert_eq!(session.expire(), AdvanceOutcome::Ignored(Ignored::TimeRemaining));
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.remaining_time(), 2);
    }

    #[test]
    fn expiry_with_time_left_is_ignored() {
        let mut session = active(3, 10);
        assert_eq!(session.expire(), AdvanceOutcome::Ignored(Ignored::TimeRemaining));
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn force_advance_matches_natural_expiry() {
        let mut forced = active(3, 10);
        let mut natural = active(3, 10);

        let forced_outcome = forced.force_advance();
        let natural_outcome = loop {
            if let TickOutcome::Transitioned(outcome) = natural.tick() {
                break outcome;
            }
        };

        assert_eq!(forced_outcome, natural_outcome);
        assert_eq!(forced.current_index(), natural.current_index());
        assert_eq!(forced.remaining_time(), natural.remaining_time());
    }

    #[test]
    fn force_advance_on_last_question_completes() {
        let mut session = active(2, 10);
        assert_eq!(session.force_advance(), AdvanceOutcome::Advanced(1));
        assert_eq!(session.force_advance(), AdvanceOutcome::Completed);
        assert_eq!(session.force_advance(), AdvanceOutcome::Ignored(Ignored::NotActive));
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn force_advance_outside_active_is_ignored() {
        let mut session = loaded(2, 10);
        assert_eq!(session.force_advance(), AdvanceOutcome::Ignored(Ignored::NotActive));
        assert_eq!(session.state(), ExamState::Waiting);
    }

    #[test]
    fn pause_freezes_countdown() {
        let mut session = active(2, 5);
        assert!(session.pause().unwrap());
        assert!(!session.pause().unwrap());

        assert_eq!(session.tick(), TickOutcome::Paused);
        assert_eq!(session.remaining_time(), 5);

        assert!(session.resume().unwrap());
        assert_eq!(session.tick(), TickOutcome::Counting(4));
    }

    #[test]
    fn pause_requires_active() {
        let mut session = loaded(2, 5);
        assert!(session.pause().is_err());
        assert!(session.resume().is_err());
    }

    #[test]
    fn closed_session_ignores_everything() {
        let mut session = active(3, 5);
        assert!(session.close());
        assert!(!session.close());

        assert_eq!(session.tick(), TickOutcome::Stopped);
        assert_eq!(session.force_advance(), AdvanceOutcome::Ignored(Ignored::Closed));
        assert_eq!(session.expire(), AdvanceOutcome::Ignored(Ignored::Closed));
        assert_eq!(session.pause(), Err(SessionError::Closed));
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn low_time_boundary() {
        let mut session = active(1, 7);
        session.tick();
        assert_eq!(session.remaining_time(), 6);
        assert!(!session.is_low_time());
        assert!(!session.view().low_time);

        session.tick();
        assert_eq!(session.remaining_time(), 5);
        assert!(session.is_low_time());
        assert!(session.view().low_time);
    }

    #[test]
    fn low_time_threshold_is_configurable() {
        let mut session = ExamSession::new("Ada", "12345").with_low_time_threshold(10);
        session
            .resolve(Ok(Some(make_quiz("12345", 1, 12))), identity)
            .unwrap();
        session.start().unwrap();

        session.tick();
        assert!(!session.is_low_time());
        session.tick();
        assert!(session.is_low_time());
    }

    #[test]
    fn waiting_is_never_low_time() {
        let session = loaded(1, 3);
        assert!(!session.is_low_time());
    }

    #[test]
    fn view_reflects_active_question() {
        let mut session = active(3, 25);
        session.force_advance();

        let view = session.view();
        assert_eq!(view.state, ExamState::Active);
        assert_eq!(view.quiz_title.as_deref(), Some("Quiz 12345"));
        assert_eq!(view.exam_code, "12345");
        assert_eq!(view.current_index, 1);
        assert_eq!(view.question_number(), 2);
        assert_eq!(view.total_questions, 3);
        assert_eq!(view.remaining_time, 25);
        assert_eq!(view.time_per_question, 25);
        assert_eq!(view.current_question.as_ref().unwrap().id, "q2");
        assert!((view.time_fraction() - 1.0).abs() < f64::EPSILON);
    }
}
