use tokio::sync::mpsc;

use quiz_core::model::{InterruptionReason, Question, QuestionId};

/// Result of submitting an answer, kept for highlighting right and wrong options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub question_id: QuestionId,
    pub selected: u8,
    pub correct_index: u8,
    pub is_correct: bool,
}

/// Notifications emitted by a session as its state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    QuestionChanged(Question),
    ScoreChanged(u32),
    Answered(AnswerOutcome),
    Skipped(InterruptionReason),
    Completed { final_score: u32 },
    /// A load failed; the session is back to idle and `advance` may be retried.
    LoadFailed(String),
}

impl SessionEvent {
    pub fn dispatch(&self, observer: &dyn SessionObserver) {
        match self {
            SessionEvent::QuestionChanged(question) => observer.on_question_changed(question),
            SessionEvent::ScoreChanged(score) => observer.on_score_changed(*score),
            SessionEvent::Answered(outcome) => observer.on_answered(outcome),
            SessionEvent::Skipped(reason) => observer.on_skipped(*reason),
            SessionEvent::Completed { final_score } => observer.on_completed(*final_score),
            SessionEvent::LoadFailed(message) => observer.on_load_failed(message),
        }
    }
}

/// Receives session notifications. Every method defaults to a no-op.
pub trait SessionObserver: Send + Sync {
    fn on_question_changed(&self, _question: &Question) {}

    fn on_score_changed(&self, _score: u32) {}

    fn on_answered(&self, _outcome: &AnswerOutcome) {}

    fn on_skipped(&self, _reason: InterruptionReason) {}

    fn on_completed(&self, _final_score: u32) {}

    fn on_load_failed(&self, _message: &str) {}
}

/// Forwards every notification into an unbounded channel.
#[derive(Clone)]
pub struct ChannelObserver {
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }

    fn forward(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            log::debug!("session event dropped: receiver closed");
        }
    }
}

impl SessionObserver for ChannelObserver {
    fn on_question_changed(&self, question: &Question) {
        self.forward(SessionEvent::QuestionChanged(question.clone()));
    }

    fn on_score_changed(&self, score: u32) {
        self.forward(SessionEvent::ScoreChanged(score));
    }

    fn on_answered(&self, outcome: &AnswerOutcome) {
        self.forward(SessionEvent::Answered(*outcome));
    }

    fn on_skipped(&self, reason: InterruptionReason) {
        self.forward(SessionEvent::Skipped(reason));
    }

    fn on_completed(&self, final_score: u32) {
        self.forward(SessionEvent::Completed { final_score });
    }

    fn on_load_failed(&self, message: &str) {
        self.forward(SessionEvent::LoadFailed(message.to_owned()));
    }
}
