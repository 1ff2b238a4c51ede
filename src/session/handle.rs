use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::quiz::QuizSource;
use crate::session::error::SessionError;
use crate::session::machine::ExamSession;
use crate::session::state::{
    AdvanceOutcome, ExamState, Ignored, SessionEvent, SessionView, TickOutcome,
};
use crate::settings::SessionSettings;

/// Buffered transition events per subscriber
const EVENT_CAPACITY: usize = 64;

/// Fan-out of views and events to the presentation layer
#[derive(Clone)]
struct Notifier {
    views: Arc<watch::Sender<SessionView>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Notifier {
    fn publish(&self, session: &ExamSession) {
        self.views.send_replace(session.view());
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn announce(&self, outcome: AdvanceOutcome) {
        match outcome {
            AdvanceOutcome::Advanced(index) => self.emit(SessionEvent::Advanced { index }),
            AdvanceOutcome::Completed => self.emit(SessionEvent::Completed),
            AdvanceOutcome::Ignored(_) => {}
        }
    }
}

/// A running exam session with its countdown clock.
///
/// The mutex around the session is the transition lock: the clock and the
/// override both advance while holding it, and an override that finds it
/// taken is dropped rather than queued behind the other transition.
pub struct SessionHandle {
    session: Arc<Mutex<ExamSession>>,
    notifier: Notifier,
    settings: SessionSettings,
    clock: StdMutex<Option<JoinHandle<()>>>,
    /// Bumped whenever the clock is replaced or stopped
    clock_epoch: Arc<AtomicU64>,
}

impl SessionHandle {
    /// Create a session in `Loading`; call [`SessionHandle::load`] next
    pub fn new(student_name: &str, exam_code: &str, settings: &SessionSettings) -> Self {
        let session = ExamSession::new(student_name, exam_code)
            .with_low_time_threshold(settings.low_time_threshold);

        let (views, _) = watch::channel(session.view());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            session: Arc::new(Mutex::new(session)),
            notifier: Notifier {
                views: Arc::new(views),
                events,
            },
            settings: settings.clone(),
            clock: StdMutex::new(None),
            clock_epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create and load a session; a failed load yields no session at all
    pub async fn join<S: QuizSource>(
        source: &S,
        student_name: &str,
        exam_code: &str,
        settings: &SessionSettings,
    ) -> Result<Self, SessionError> {
        let handle = Self::new(student_name, exam_code, settings);
        handle.load(source).await?;
        Ok(handle)
    }

    /// Fetch the quiz and move to `Waiting`, or to `Failed` with the reason
    pub async fn load<S: QuizSource>(&self, source: &S) -> Result<(), SessionError> {
        let code = {
            let session = self.session.lock().await;
            if session.is_closed() {
                return Err(SessionError::Closed);
            }
            if session.state() != ExamState::Loading {
                return Err(SessionError::NotReady(session.state().as_str(), "loading"));
            }
            session.requested_code().to_string()
        };

        info!("Loading exam '{}'", code);

        let timeout = self.settings.load_timeout();
        let lookup = match time::timeout(timeout, source.lookup(&code)).await {
            Ok(Ok(found)) => Ok(found),
            Ok(Err(e)) => Err(SessionError::SourceUnavailable(format!("{:#}", e))),
            Err(_) => Err(SessionError::LoadTimeout(timeout.as_secs())),
        };

        let mut session = self.session.lock().await;
        let result = session.resolve(lookup, |questions| source.shuffle(questions));

        match &result {
            Ok(()) => self.notifier.emit(SessionEvent::Loaded {
                total_questions: session.questions().len(),
            }),
            Err(e) => {
                warn!("Failed to load exam '{}': {}", code, e);
                if e.is_load_failure() {
                    self.notifier.emit(SessionEvent::LoadFailed(e.clone()));
                }
            }
        }
        self.notifier.publish(&session);

        result
    }

    /// Student start signal: `Waiting -> Active`, starts the clock
    pub async fn start(&self) -> Result<(), SessionError> {
        let mut session = self.session.lock().await;
        session.start()?;
        self.notifier.emit(SessionEvent::Started);
        self.notifier.publish(&session);

        self.spawn_clock();
        Ok(())
    }

    /// Operator override: advance now, unless another transition holds the lock
    pub async fn force_advance(&self) -> AdvanceOutcome {
        let Ok(mut session) = self.session.try_lock() else {
            debug!("Force advance dropped: transition in progress");
            return AdvanceOutcome::Ignored(Ignored::Busy);
        };

        let outcome = session.force_advance();
        self.notifier.announce(outcome);

        match outcome {
            AdvanceOutcome::Advanced(_) => {
                self.notifier.publish(&session);
                // Fresh clock so the new question gets its full countdown.
                // Replaced before the lock is released: a tick of the old
                // clock queued on the lock must not reach the new question.
                self.spawn_clock();
            }
            AdvanceOutcome::Completed => {
                self.notifier.publish(&session);
                self.stop_clock();
            }
            AdvanceOutcome::Ignored(reason) => {
                debug!("Force advance ignored: {:?}", reason);
            }
        }

        outcome
    }

    /// Freeze the countdown on the current question
    pub async fn pause(&self) -> Result<(), SessionError> {
        let mut session = self.session.lock().await;
        if session.pause()? {
            info!("Exam paused at question {}", session.current_index() + 1);
            self.notifier.emit(SessionEvent::Paused);
            self.notifier.publish(&session);
        }
        Ok(())
    }

    /// Resume a paused countdown
    pub async fn resume(&self) -> Result<(), SessionError> {
        let mut session = self.session.lock().await;
        if session.resume()? {
            info!("Exam resumed at question {}", session.current_index() + 1);
            self.notifier.emit(SessionEvent::Resumed);
            self.notifier.publish(&session);
        }
        Ok(())
    }

    /// Tear down: stop the clock and turn every later event into a no-op
    pub async fn shutdown(&self) {
        self.stop_clock();

        let mut session = self.session.lock().await;
        if session.close() {
            info!("Session {} closed", session.id());
            self.notifier.emit(SessionEvent::Closed);
            self.notifier.publish(&session);
        }
    }

    /// Latest view
    pub fn view(&self) -> SessionView {
        self.notifier.views.borrow().clone()
    }

    /// Re-render channel: always holds the latest view
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.notifier.views.subscribe()
    }

    /// Transition events from now on
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.notifier.events.subscribe()
    }

    /// Whether the countdown task is alive
    pub fn is_clock_running(&self) -> bool {
        self.clock_slot()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    fn clock_slot(&self) -> StdMutexGuard<'_, Option<JoinHandle<()>>> {
        self.clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a new countdown task, retiring the previous one.
    ///
    /// Callers hold the transition lock.
    fn spawn_clock(&self) {
        let epoch = self.clock_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let task = tokio::spawn(run_clock(
            Arc::clone(&self.session),
            self.notifier.clone(),
            self.settings.tick(),
            Arc::clone(&self.clock_epoch),
            epoch,
        ));

        if let Some(previous) = self.clock_slot().replace(task) {
            previous.abort();
        }
    }

    fn stop_clock(&self) {
        self.clock_epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.clock_slot().take() {
            task.abort();
        }
    }
}

/// Countdown loop: one tick per period until the session leaves `Active`.
///
/// A clock whose epoch has been superseded exits without touching the
/// session, even if it already won the lock.
async fn run_clock(
    session: Arc<Mutex<ExamSession>>,
    notifier: Notifier,
    period: Duration,
    current_epoch: Arc<AtomicU64>,
    epoch: u64,
) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let mut session = session.lock().await;
        if current_epoch.load(Ordering::SeqCst) != epoch {
            debug!("Superseded countdown clock exiting");
            break;
        }

        match session.tick() {
            TickOutcome::Counting(_) => notifier.publish(&session),
            TickOutcome::Paused => {}
            TickOutcome::Transitioned(outcome) => {
                notifier.announce(outcome);
                notifier.publish(&session);
                if outcome == AdvanceOutcome::Completed {
                    break;
                }
            }
            TickOutcome::Stopped => break,
        }
    }

    debug!("Countdown clock stopped");
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop_clock();
    }
}
