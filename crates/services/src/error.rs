//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::QuestionError;
use storage::repository::StorageError;

use crate::sessions::SessionState;

/// Errors emitted by `QuestionBank`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionBankError {
    #[error("question bank is empty; seed it or add a question first")]
    EmptyBank,
    #[error(transparent)]
    Validation(#[from] QuestionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("background load failed: {0}")]
    Worker(String),
}

/// Errors emitted by quiz sessions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot {action} while the session is {state}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },
    #[error("answer index {index} is out of range")]
    InvalidAnswer { index: u8 },
    #[error(transparent)]
    Bank(#[from] QuestionBankError),
    #[error("session is no longer running")]
    Closed,
}
