use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use quiz_core::model::{InterruptionReason, Question, QuizSettings};

use super::events::{AnswerOutcome, SessionObserver};
use super::machine::{Advance, SessionMachine};
use super::progress::SessionProgress;
use crate::error::{QuestionBankError, SessionError};
use crate::question_bank::QuestionBank;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;
type LoadResult = Result<Question, QuestionBankError>;

enum Command {
    Start(Reply<SessionProgress>),
    Advance(Reply<SessionProgress>),
    Submit(u8, Reply<AnswerOutcome>),
    Restart(Reply<SessionProgress>),
    Interrupt(InterruptionReason),
    Background,
    Foreground,
    Progress(oneshot::Sender<SessionProgress>),
}

/// Handle to a running quiz session.
///
/// The session runs as a task that owns a `SessionMachine`. Commands are applied
/// one at a time in arrival order; question loads run on a separate task so
/// interruptions and lifecycle events are still accepted while a load is in flight.
/// Cloning the handle shares the same session.
#[derive(Clone)]
pub struct QuizSession {
    commands: mpsc::UnboundedSender<Command>,
}

/// Feeds external interruptions (calls, messages) into one session.
#[derive(Clone)]
pub struct InterruptionSender {
    commands: mpsc::UnboundedSender<Command>,
}

impl InterruptionSender {
    /// Report an interruption.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the session has shut down.
    pub fn interrupt(&self, reason: InterruptionReason) -> Result<(), SessionError> {
        self.commands
            .send(Command::Interrupt(reason))
            .map_err(|_| SessionError::Closed)
    }
}

impl QuizSession {
    /// Spawn a session task drawing questions from `bank`.
    ///
    /// The task stops once every handle and `InterruptionSender` is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(
        bank: Arc<QuestionBank>,
        settings: QuizSettings,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let actor = SessionActor {
            machine: SessionMachine::new(settings),
            bank,
            observer,
            commands: rx,
            loading: None,
            waiting: None,
        };
        tokio::spawn(actor.run());
        Self { commands }
    }

    /// A sender that interruption sources can hold independently of the UI.
    #[must_use]
    pub fn interruptions(&self) -> InterruptionSender {
        InterruptionSender {
            commands: self.commands.clone(),
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    fn notify(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }

    /// Start the play-through; resolves once the first question is loaded.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` if already started, or the bank error if
    /// the load failed (the session stays retryable through `advance`).
    pub async fn start(&self) -> Result<SessionProgress, SessionError> {
        self.request(Command::Start).await
    }

    /// Load the next question, or complete the session when the budget is spent.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` when the current question is unanswered
    /// or another load is in flight, or the bank error if the load failed.
    pub async fn advance(&self) -> Result<SessionProgress, SessionError> {
        self.request(Command::Advance).await
    }

    /// Answer the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` if no question awaits an answer, or
    /// `SessionError::InvalidAnswer` for an index outside `0..=3`.
    pub async fn submit_answer(&self, selected: u8) -> Result<AnswerOutcome, SessionError> {
        self.request(|reply| Command::Submit(selected, reply)).await
    }

    /// Reset score and progress. Call `start` afterwards to play again.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` while a load is in flight.
    pub async fn restart(&self) -> Result<SessionProgress, SessionError> {
        self.request(Command::Restart).await
    }

    /// Current progress snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the session has shut down.
    pub async fn progress(&self) -> Result<SessionProgress, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.notify(Command::Progress(tx))?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Skip the current question because of an interruption.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the session has shut down.
    pub fn on_interruption(&self, reason: InterruptionReason) -> Result<(), SessionError> {
        self.notify(Command::Interrupt(reason))
    }

    /// The app left the foreground.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the session has shut down.
    pub fn on_background(&self) -> Result<(), SessionError> {
        self.notify(Command::Background)
    }

    /// The app came back; skips the question shown before backgrounding.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the session has shut down.
    pub fn on_foreground(&self) -> Result<(), SessionError> {
        self.notify(Command::Foreground)
    }
}

//
// ─── ACTOR ─────────────────────────────────────────────────────────────────────
//

struct SessionActor {
    machine: SessionMachine,
    bank: Arc<QuestionBank>,
    observer: Arc<dyn SessionObserver>,
    commands: mpsc::UnboundedReceiver<Command>,
    loading: Option<JoinHandle<LoadResult>>,
    waiting: Option<Reply<SessionProgress>>,
}

async fn wait_for_load(slot: &mut Option<JoinHandle<LoadResult>>) -> LoadResult {
    match slot {
        Some(handle) => handle
            .await
            .unwrap_or_else(|e| Err(QuestionBankError::Worker(e.to_string()))),
        None => std::future::pending().await,
    }
}

impl SessionActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                result = wait_for_load(&mut self.loading), if self.loading.is_some() => {
                    self.loading = None;
                    self.finish_load(result);
                }
            }
        }
        if let Some(handle) = self.loading.take() {
            handle.abort();
            log::debug!("cancelled an unfinished question load");
        }
        log::debug!("quiz session stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let step = self.machine.start();
                self.follow(step, Some(reply));
            }
            Command::Advance(reply) => {
                let step = self.machine.advance();
                self.follow(step, Some(reply));
            }
            Command::Submit(selected, reply) => {
                let outcome = self.machine.submit_answer(selected);
                self.flush();
                let _ = reply.send(outcome);
            }
            Command::Restart(reply) => {
                let result = self.machine.restart().map(|()| self.machine.progress());
                self.flush();
                let _ = reply.send(result);
            }
            Command::Interrupt(reason) => {
                let step = self.machine.on_interruption(reason);
                self.follow_event(step);
            }
            Command::Background => self.machine.on_background(),
            Command::Foreground => {
                let step = self.machine.on_foreground();
                self.follow_event(step);
            }
            Command::Progress(reply) => {
                let _ = reply.send(self.machine.progress());
            }
        }
    }

    fn follow_event(&mut self, step: Option<Advance>) {
        match step {
            Some(step) => self.follow(Ok(step), None),
            None => self.flush(),
        }
    }

    fn follow(
        &mut self,
        step: Result<Advance, SessionError>,
        reply: Option<Reply<SessionProgress>>,
    ) {
        self.flush();
        match step {
            Ok(Advance::Load) => {
                let bank = Arc::clone(&self.bank);
                self.loading = Some(tokio::spawn(async move { bank.pick_random_unseen().await }));
                self.waiting = reply;
            }
            Ok(Advance::Completed { .. }) => {
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(self.machine.progress()));
                }
            }
            Err(err) => {
                if let Some(reply) = reply {
                    let _ = reply.send(Err(err));
                }
            }
        }
    }

    fn finish_load(&mut self, result: LoadResult) {
        let outcome = self.machine.finish_load(result);
        self.flush();
        if let Some(reply) = self.waiting.take() {
            let _ = reply.send(outcome.map(|()| self.machine.progress()));
        }
    }

    fn flush(&mut self) {
        for event in self.machine.take_events() {
            event.dispatch(self.observer.as_ref());
        }
    }
}
