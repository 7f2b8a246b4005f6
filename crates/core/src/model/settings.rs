use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("max questions must be > 0")]
    InvalidMaxQuestions,

    #[error("storage timeout must be > 0")]
    InvalidStorageTimeout,
}

/// Tunables for a play-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizSettings {
    max_questions: u32,
    storage_timeout: Duration,
}

impl QuizSettings {
    pub const DEFAULT_MAX_QUESTIONS: u32 = 5;
    pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(3);

    /// Creates custom settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if `max_questions` or `storage_timeout` is zero.
    pub fn new(max_questions: u32, storage_timeout: Duration) -> Result<Self, SettingsError> {
        if max_questions == 0 {
            return Err(SettingsError::InvalidMaxQuestions);
        }
        if storage_timeout.is_zero() {
            return Err(SettingsError::InvalidStorageTimeout);
        }
        Ok(Self {
            max_questions,
            storage_timeout,
        })
    }

    /// Number of questions asked before the session completes.
    #[must_use]
    pub fn max_questions(&self) -> u32 {
        self.max_questions
    }

    /// Upper bound for a single storage access.
    #[must_use]
    pub fn storage_timeout(&self) -> Duration {
        self.storage_timeout
    }
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            max_questions: Self::DEFAULT_MAX_QUESTIONS,
            storage_timeout: Self::DEFAULT_STORAGE_TIMEOUT,
        }
    }
}
