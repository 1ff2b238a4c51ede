/// Exam sessions
///
/// This module provides:
/// - The synchronous exam state machine (loading, waiting, active, completed)
/// - The async handle that runs its countdown and publishes views
/// - Typed session errors

pub mod error;
pub mod handle;
pub mod machine;
pub mod state;

pub use error::SessionError;
pub use handle::SessionHandle;
pub use machine::{DEFAULT_LOW_TIME_THRESHOLD, ExamSession};
pub use state::{AdvanceOutcome, ExamState, Ignored, SessionEvent, SessionView, TickOutcome};
