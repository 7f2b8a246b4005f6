mod events;
mod machine;
mod progress;
mod service;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use events::{AnswerOutcome, ChannelObserver, SessionEvent, SessionObserver};
pub use machine::{Advance, SessionMachine, SessionState};
pub use progress::SessionProgress;
pub use service::{InterruptionSender, QuizSession};
