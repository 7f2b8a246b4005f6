#![forbid(unsafe_code)]

pub mod error;
pub mod question_bank;
pub mod sessions;

pub use sessions as session;

pub use error::{QuestionBankError, SessionError};
pub use question_bank::QuestionBank;

pub use sessions::{
    AnswerOutcome, ChannelObserver, InterruptionSender, QuizSession, SessionEvent,
    SessionMachine, SessionObserver, SessionProgress, SessionState,
};
