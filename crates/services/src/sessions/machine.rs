use std::fmt;

use quiz_core::model::{InterruptionReason, OPTION_COUNT, Question, QuizSettings};

use super::events::{AnswerOutcome, SessionEvent};
use super::progress::SessionProgress;
use crate::error::{QuestionBankError, SessionError};

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    AwaitingAnswer,
    Answered,
    Completed,
}

impl SessionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::AwaitingAnswer => "awaiting an answer",
            SessionState::Answered => "answered",
            SessionState::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller must do after the session moved forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Fetch a question from the bank and hand the result to `finish_load`.
    Load,
    /// The play-through is over.
    Completed { final_score: u32 },
}

//
// ─── MACHINE ───────────────────────────────────────────────────────────────────
//

/// Synchronous quiz state machine.
///
/// Performs no I/O: transitions that need a question return `Advance::Load`
/// and wait for `finish_load`. Notifications accumulate until `take_events`.
#[derive(Debug)]
pub struct SessionMachine {
    settings: QuizSettings,
    state: SessionState,
    current: Option<Question>,
    last_answer: Option<AnswerOutcome>,
    score: u32,
    asked: u32,
    pending_refresh: bool,
    queued_skip: Option<InterruptionReason>,
    events: Vec<SessionEvent>,
}

impl SessionMachine {
    #[must_use]
    pub fn new(settings: QuizSettings) -> Self {
        Self {
            settings,
            state: SessionState::Idle,
            current: None,
            last_answer: None,
            score: 0,
            asked: 0,
            pending_refresh: false,
            queued_skip: None,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn current(&self) -> Option<&Question> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn asked(&self) -> u32 {
        self.asked
    }

    #[must_use]
    pub fn pending_refresh(&self) -> bool {
        self.pending_refresh
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            state: self.state,
            current: self.current.clone(),
            last_answer: self.last_answer,
            score: self.score,
            asked: self.asked,
            max_questions: self.settings.max_questions(),
            pending_refresh: self.pending_refresh,
        }
    }

    /// Drain the notifications produced since the last call.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidState {
            action,
            state: self.state,
        }
    }

    /// Begin a fresh play-through.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is idle.
    pub fn start(&mut self) -> Result<Advance, SessionError> {
        if self.state != SessionState::Idle {
            return Err(self.invalid("start"));
        }
        Ok(self.step())
    }

    /// Move to the next question, or complete the session once the budget is spent.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is idle or the current
    /// question has been answered. In particular a second advance while a load is in
    /// flight is rejected.
    pub fn advance(&mut self) -> Result<Advance, SessionError> {
        match self.state {
            SessionState::Idle | SessionState::Answered => Ok(self.step()),
            _ => Err(self.invalid("advance")),
        }
    }

    fn step(&mut self) -> Advance {
        self.current = None;
        self.last_answer = None;

        if self.asked >= self.settings.max_questions() {
            self.state = SessionState::Completed;
            self.events.push(SessionEvent::Completed {
                final_score: self.score,
            });
            log::info!(
                "quiz completed with {} of {} correct",
                self.score,
                self.settings.max_questions()
            );
            return Advance::Completed {
                final_score: self.score,
            };
        }

        self.state = SessionState::Loading;
        Advance::Load
    }

    /// Apply the outcome of a load started by `Advance::Load`.
    ///
    /// A skip queued while loading is reported before the new question; it does
    /// not trigger another load.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` if no load is in flight, or the bank error
    /// after moving back to idle.
    pub fn finish_load(
        &mut self,
        result: Result<Question, QuestionBankError>,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Loading {
            return Err(self.invalid("finish loading"));
        }

        let queued = self.queued_skip.take();
        match result {
            Ok(question) => {
                if let Some(reason) = queued {
                    self.events.push(SessionEvent::Skipped(reason));
                }
                self.asked += 1;
                self.state = SessionState::AwaitingAnswer;
                self.events
                    .push(SessionEvent::QuestionChanged(question.clone()));
                self.current = Some(question);
                Ok(())
            }
            Err(err) => {
                if let Some(reason) = queued {
                    log::debug!("dropping {reason} skip queued behind a failed load");
                }
                log::warn!("failed to load question: {err}");
                self.state = SessionState::Idle;
                self.events.push(SessionEvent::LoadFailed(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Answer the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless a question is awaiting an answer
    /// (so a second submission never changes the score), or
    /// `SessionError::InvalidAnswer` if `selected` is not an option index.
    pub fn submit_answer(&mut self, selected: u8) -> Result<AnswerOutcome, SessionError> {
        if self.state != SessionState::AwaitingAnswer {
            return Err(self.invalid("submit an answer"));
        }
        if usize::from(selected) >= OPTION_COUNT {
            return Err(SessionError::InvalidAnswer { index: selected });
        }
        let Some(question) = self.current.as_ref() else {
            return Err(self.invalid("submit an answer"));
        };

        let outcome = AnswerOutcome {
            question_id: question.id(),
            selected,
            correct_index: question.correct_index(),
            is_correct: question.is_correct(selected),
        };

        if outcome.is_correct {
            self.score += 1;
            self.events.push(SessionEvent::ScoreChanged(self.score));
        }
        self.events.push(SessionEvent::Answered(outcome));
        self.last_answer = Some(outcome);
        self.state = SessionState::Answered;
        Ok(outcome)
    }

    /// Reset score and progress; the session returns to idle.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` while a load is in flight.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Loading {
            return Err(self.invalid("restart"));
        }
        self.state = SessionState::Idle;
        self.current = None;
        self.last_answer = None;
        self.score = 0;
        self.asked = 0;
        self.pending_refresh = false;
        self.queued_skip = None;
        self.events.push(SessionEvent::ScoreChanged(0));
        Ok(())
    }

    /// Skip the current question because of an external interruption.
    ///
    /// Returns the follow-up step when the skip moved the session forward.
    pub fn on_interruption(&mut self, reason: InterruptionReason) -> Option<Advance> {
        match self.state {
            SessionState::AwaitingAnswer | SessionState::Answered => {
                log::debug!("skipping question because of {reason}");
                self.events.push(SessionEvent::Skipped(reason));
                Some(self.step())
            }
            SessionState::Loading => {
                if self.queued_skip.is_none() {
                    self.queued_skip = Some(reason);
                } else {
                    log::debug!("{reason} interruption merged into the queued skip");
                }
                None
            }
            SessionState::Idle | SessionState::Completed => {
                log::warn!("ignoring {reason} interruption while {}", self.state);
                None
            }
        }
    }

    pub fn on_background(&mut self) {
        self.pending_refresh = true;
    }

    /// Returning to the foreground after `on_background` skips the current question.
    ///
    /// Follows `on_interruption(Other)`: while loading the skip is queued behind the
    /// load. In `Idle` (including after a failed load) and `Completed` nothing is on
    /// screen, so only the pending refresh is cleared; no skip is emitted and
    /// nothing is loaded. Call `advance` to retry from `Idle`.
    pub fn on_foreground(&mut self) -> Option<Advance> {
        if !std::mem::take(&mut self.pending_refresh) {
            return None;
        }
        self.on_interruption(InterruptionReason::Other)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{QuestionDraft, QuestionId};
    use std::time::Duration;
    use storage::repository::StorageError;

    fn question(id: u64, correct_index: i64) -> Question {
        QuestionDraft::new(format!("Q{id}"), ["a", "b", "c", "d"], correct_index)
            .validate()
            .unwrap()
            .assign_id(QuestionId::new(id))
    }

    fn machine(max_questions: u32) -> SessionMachine {
        SessionMachine::new(QuizSettings::new(max_questions, Duration::from_secs(1)).unwrap())
    }

    fn load(machine: &mut SessionMachine, id: u64) {
        machine.finish_load(Ok(question(id, 1))).unwrap();
    }

    fn started(max_questions: u32) -> SessionMachine {
        let mut machine = machine(max_questions);
        assert_eq!(machine.start().unwrap(), Advance::Load);
        load(&mut machine, 1);
        machine.take_events();
        machine
    }

    #[test]
    fn start_loads_first_question() {
        let mut machine = machine(5);
        assert_eq!(machine.start().unwrap(), Advance::Load);
        assert_eq!(machine.state(), SessionState::Loading);
        assert_eq!(machine.asked(), 0);

        load(&mut machine, 1);
        assert_eq!(machine.state(), SessionState::AwaitingAnswer);
        assert_eq!(machine.asked(), 1);
        assert_eq!(machine.current().map(Question::id), Some(QuestionId::new(1)));
        assert!(matches!(
            machine.take_events().as_slice(),
            [SessionEvent::QuestionChanged(q)] if q.id() == QuestionId::new(1)
        ));
    }

    #[test]
    fn start_is_rejected_once_running() {
        let mut machine = started(5);
        let err = machine.start().unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState {
                state: SessionState::AwaitingAnswer,
                ..
            }
        ));
    }

    #[test]
    fn correct_answer_scores_and_wrong_answer_does_not() {
        let mut machine = started(5);
        let outcome = machine.submit_answer(1).unwrap();
        assert!(outcome.is_correct);
        assert_eq!(machine.score(), 1);
        assert_eq!(
            machine.take_events(),
            vec![SessionEvent::ScoreChanged(1), SessionEvent::Answered(outcome)]
        );

        machine.advance().unwrap();
        load(&mut machine, 2);
        machine.take_events();

        let outcome = machine.submit_answer(3).unwrap();
        assert!(!outcome.is_correct);
        assert_eq!(outcome.correct_index, 1);
        assert_eq!(machine.score(), 1);
        assert_eq!(machine.take_events(), vec![SessionEvent::Answered(outcome)]);
        // The answered question stays on screen for highlighting.
        assert_eq!(machine.current().map(Question::id), Some(QuestionId::new(2)));
    }

    #[test]
    fn double_submit_is_rejected_without_scoring() {
        let mut machine = started(5);
        machine.submit_answer(1).unwrap();
        let err = machine.submit_answer(1).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState {
                state: SessionState::Answered,
                ..
            }
        ));
        assert_eq!(machine.score(), 1);
    }

    #[test]
    fn out_of_range_answer_is_rejected() {
        let mut machine = started(5);
        let err = machine.submit_answer(4).unwrap_err();
        assert!(matches!(err, SessionError::InvalidAnswer { index: 4 }));
        assert_eq!(machine.state(), SessionState::AwaitingAnswer);
    }

    #[test]
    fn advance_requires_an_answer_or_idle() {
        let mut machine = started(5);
        assert!(machine.advance().is_err());

        machine.submit_answer(0).unwrap();
        assert_eq!(machine.advance().unwrap(), Advance::Load);
        let err = machine.advance().unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState {
                state: SessionState::Loading,
                ..
            }
        ));
    }

    #[test]
    fn completes_after_max_questions() {
        let mut machine = machine(2);
        machine.start().unwrap();
        for id in 1..=2 {
            load(&mut machine, id);
            machine.submit_answer(1).unwrap();
            let step = machine.advance().unwrap();
            if id == 2 {
                assert_eq!(step, Advance::Completed { final_score: 2 });
            }
        }
        assert_eq!(machine.state(), SessionState::Completed);
        assert!(machine.progress().is_complete());
        assert!(
            machine
                .take_events()
                .contains(&SessionEvent::Completed { final_score: 2 })
        );
        assert!(machine.advance().is_err());
    }

    #[test]
    fn failed_load_returns_to_idle_and_can_retry() {
        let mut machine = machine(5);
        machine.start().unwrap();
        let err = machine
            .finish_load(Err(QuestionBankError::Storage(StorageError::Timeout(
                Duration::from_secs(1),
            ))))
            .unwrap_err();
        assert!(matches!(err, SessionError::Bank(_)));
        assert_eq!(machine.state(), SessionState::Idle);
        assert_eq!(machine.asked(), 0);
        assert!(matches!(
            machine.take_events().as_slice(),
            [SessionEvent::LoadFailed(_)]
        ));

        assert_eq!(machine.advance().unwrap(), Advance::Load);
        load(&mut machine, 1);
        assert_eq!(machine.asked(), 1);
    }

    #[test]
    fn finish_load_outside_loading_is_rejected() {
        let mut machine = machine(5);
        assert!(machine.finish_load(Ok(question(1, 0))).is_err());
        assert_eq!(machine.asked(), 0);
    }

    #[test]
    fn interruption_skips_unanswered_question_once() {
        let mut machine = started(5);
        machine.submit_answer(1).unwrap();
        machine.advance().unwrap();
        load(&mut machine, 2);
        machine.take_events();
        assert_eq!(machine.asked(), 2);

        let step = machine.on_interruption(InterruptionReason::Call);
        assert_eq!(step, Some(Advance::Load));
        assert!(machine.current().is_none());
        assert_eq!(
            machine.take_events(),
            vec![SessionEvent::Skipped(InterruptionReason::Call)]
        );

        load(&mut machine, 3);
        assert_eq!(machine.asked(), 3);
        assert_eq!(machine.score(), 1);
    }

    #[test]
    fn interruption_on_last_question_completes() {
        let mut machine = started(1);
        let step = machine.on_interruption(InterruptionReason::Sms);
        assert_eq!(step, Some(Advance::Completed { final_score: 0 }));
        assert_eq!(
            machine.take_events(),
            vec![
                SessionEvent::Skipped(InterruptionReason::Sms),
                SessionEvent::Completed { final_score: 0 },
            ]
        );
    }

    #[test]
    fn interruption_while_loading_is_queued_not_doubled() {
        let mut machine = machine(5);
        machine.start().unwrap();
        assert_eq!(machine.on_interruption(InterruptionReason::Call), None);
        assert_eq!(machine.on_interruption(InterruptionReason::Sms), None);
        assert_eq!(machine.state(), SessionState::Loading);

        load(&mut machine, 1);
        assert_eq!(machine.state(), SessionState::AwaitingAnswer);
        assert_eq!(machine.asked(), 1);
        let events = machine.take_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], SessionEvent::Skipped(InterruptionReason::Call));
        assert!(matches!(events[1], SessionEvent::QuestionChanged(_)));
    }

    #[test]
    fn interruption_when_idle_or_completed_is_ignored() {
        let mut machine = machine(5);
        assert_eq!(machine.on_interruption(InterruptionReason::Call), None);
        assert!(machine.take_events().is_empty());

        let mut machine = started(1);
        machine.submit_answer(0).unwrap();
        machine.advance().unwrap();
        machine.take_events();
        assert_eq!(machine.on_interruption(InterruptionReason::Sms), None);
        assert!(machine.take_events().is_empty());
    }

    #[test]
    fn background_then_foreground_skips_exactly_once() {
        let mut machine = started(5);
        machine.on_background();
        assert!(machine.pending_refresh());

        assert_eq!(machine.on_foreground(), Some(Advance::Load));
        assert!(!machine.pending_refresh());
        assert_eq!(
            machine.take_events(),
            vec![SessionEvent::Skipped(InterruptionReason::Other)]
        );

        load(&mut machine, 2);
        assert_eq!(machine.on_foreground(), None);
        assert_eq!(machine.asked(), 2);
    }

    #[test]
    fn foreground_without_background_is_a_no_op() {
        let mut machine = started(5);
        assert_eq!(machine.on_foreground(), None);
        assert!(machine.take_events().is_empty());
        assert_eq!(machine.state(), SessionState::AwaitingAnswer);
    }

    #[test]
    fn foreground_while_idle_only_clears_refresh() {
        let mut machine = machine(5);
        machine.start().unwrap();
        machine
            .finish_load(Err(QuestionBankError::EmptyBank))
            .unwrap_err();
        machine.take_events();

        machine.on_background();
        assert_eq!(machine.on_foreground(), None);
        assert!(!machine.pending_refresh());
        assert_eq!(machine.state(), SessionState::Idle);
        assert!(machine.take_events().is_empty());
    }

    #[test]
    fn foreground_while_loading_queues_one_skip() {
        let mut machine = machine(5);
        machine.start().unwrap();
        machine.on_background();
        assert_eq!(machine.on_foreground(), None);
        assert_eq!(machine.state(), SessionState::Loading);

        load(&mut machine, 1);
        assert_eq!(machine.asked(), 1);
        let events = machine.take_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], SessionEvent::Skipped(InterruptionReason::Other));
        assert!(matches!(events[1], SessionEvent::QuestionChanged(_)));
    }

    #[test]
    fn restart_resets_progress() {
        let mut machine = started(1);
        machine.submit_answer(1).unwrap();
        machine.advance().unwrap();
        machine.on_background();
        machine.take_events();

        machine.restart().unwrap();
        assert_eq!(machine.state(), SessionState::Idle);
        assert_eq!(machine.score(), 0);
        assert_eq!(machine.asked(), 0);
        assert!(!machine.pending_refresh());
        assert_eq!(machine.take_events(), vec![SessionEvent::ScoreChanged(0)]);

        assert_eq!(machine.start().unwrap(), Advance::Load);
    }

    #[test]
    fn restart_is_rejected_while_loading() {
        let mut machine = machine(5);
        machine.start().unwrap();
        assert!(machine.restart().is_err());
        assert_eq!(machine.state(), SessionState::Loading);
    }
}
