use quiz_core::model::Question;

use super::events::AnswerOutcome;
use super::machine::SessionState;

/// Point-in-time view of a session, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub state: SessionState,
    pub current: Option<Question>,
    pub last_answer: Option<AnswerOutcome>,
    pub score: u32,
    pub asked: u32,
    pub max_questions: u32,
    pub pending_refresh: bool,
}

impl SessionProgress {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Completed
    }

    /// Questions still to be asked in this play-through.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.max_questions.saturating_sub(self.asked)
    }
}
