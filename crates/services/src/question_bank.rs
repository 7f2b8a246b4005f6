use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;

use quiz_core::model::{
    Question, QuestionDraft, QuestionId, QuizSettings, ValidatedQuestion, default_questions,
};
use quiz_core::selection::ExclusionSet;
use storage::repository::{QuestionRepository, StorageError};

use crate::error::QuestionBankError;

struct Selection {
    shown: ExclusionSet,
    rng: StdRng,
}

/// An id marked as shown whose record has not been delivered yet.
///
/// Released on drop unless kept, so a failed or cancelled lookup does not use
/// up a question for the rest of the cycle.
struct Reservation<'a> {
    shown: &'a mut ExclusionSet,
    id: QuestionId,
    kept: bool,
}

impl Reservation<'_> {
    fn keep(mut self) -> usize {
        self.kept = true;
        self.shown.len()
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.kept {
            self.shown.release(self.id);
            log::debug!("released question {} after an unfinished lookup", self.id);
        }
    }
}

/// Durable question storage with non-repeating random retrieval.
///
/// The exclusion set belongs to this instance; share the bank as
/// `Arc<QuestionBank>` so every session draws from the same cycle.
pub struct QuestionBank {
    questions: Arc<dyn QuestionRepository>,
    selection: Mutex<Selection>,
    timeout: Duration,
}

impl QuestionBank {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self {
            questions,
            selection: Mutex::new(Selection {
                shown: ExclusionSet::new(),
                rng: StdRng::from_os_rng(),
            }),
            timeout: QuizSettings::DEFAULT_STORAGE_TIMEOUT,
        }
    }

    /// Use a deterministic random sequence.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.selection.get_mut().rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Bound every storage access by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn guarded<T>(
        &self,
        access: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        tokio::time::timeout(self.timeout, access)
            .await
            .map_err(|_| StorageError::Timeout(self.timeout))?
    }

    /// Total number of stored questions.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Storage` if the repository fails or times out.
    pub async fn count(&self) -> Result<u64, QuestionBankError> {
        Ok(self.guarded(self.questions.count_questions()).await?)
    }

    /// Insert the default question set when the bank is empty.
    ///
    /// Returns `true` if questions were inserted, `false` if the bank already had some.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Storage` if the repository fails or times out.
    pub async fn ensure_seeded(&self) -> Result<bool, QuestionBankError> {
        // Held so concurrent callers cannot both observe an empty bank.
        let _selection = self.selection.lock().await;

        if self.guarded(self.questions.count_questions()).await? > 0 {
            return Ok(false);
        }

        let defaults = default_questions()
            .into_iter()
            .map(QuestionDraft::validate)
            .collect::<Result<Vec<ValidatedQuestion>, _>>()?;
        let ids = self
            .guarded(self.questions.insert_questions(&defaults))
            .await?;
        log::info!("seeded question bank with {} default questions", ids.len());
        Ok(true)
    }

    /// Validate and store a new question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Validation` if the draft is malformed (nothing is
    /// stored), or `QuestionBankError::Storage` if the repository fails.
    pub async fn add(&self, draft: QuestionDraft) -> Result<QuestionId, QuestionBankError> {
        let question = draft.validate()?;
        let id = self
            .guarded(self.questions.insert_question(&question))
            .await?;
        log::debug!("added question {id}");
        Ok(id)
    }

    /// Pick a random question that has not been shown in the current cycle.
    ///
    /// Once every stored question has been shown the cycle restarts.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::EmptyBank` if nothing is stored, or
    /// `QuestionBankError::Storage` if the repository fails or times out.
    pub async fn pick_random_unseen(&self) -> Result<Question, QuestionBankError> {
        let mut selection = self.selection.lock().await;
        let ids = self.guarded(self.questions.question_ids()).await?;

        let Selection { shown, rng } = &mut *selection;
        let id = shown.pick(&ids, rng).ok_or(QuestionBankError::EmptyBank)?;
        if shown.len() == 1 && ids.len() > 1 {
            log::debug!("starting a new cycle over {} questions", ids.len());
        }

        let reservation = Reservation {
            shown,
            id,
            kept: false,
        };
        let question = self.guarded(self.questions.get_question(id)).await?;
        let shown_len = reservation.keep();
        log::debug!("picked question {id} ({shown_len}/{} shown)", ids.len());
        Ok(question)
    }

    /// Size of the current exclusion set.
    pub async fn shown_len(&self) -> usize {
        self.selection.lock().await.shown.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use storage::repository::InMemoryRepository;

    fn bank() -> QuestionBank {
        QuestionBank::new(Arc::new(InMemoryRepository::new())).with_seed(17)
    }

    #[tokio::test]
    async fn ensure_seeded_is_idempotent() {
        let bank = bank();
        assert_eq!(bank.count().await.unwrap(), 0);

        assert!(bank.ensure_seeded().await.unwrap());
        assert_eq!(bank.count().await.unwrap(), 10);

        assert!(!bank.ensure_seeded().await.unwrap());
        assert_eq!(bank.count().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn ensure_seeded_skips_non_empty_bank() {
        let bank = bank();
        bank.add(QuestionDraft::new("Q", ["a", "b", "c", "d"], 2))
            .await
            .unwrap();
        assert!(!bank.ensure_seeded().await.unwrap());
        assert_eq!(bank.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn add_rejects_invalid_drafts_without_storing() {
        let bank = bank();
        let err = bank
            .add(QuestionDraft::new("Q", ["a", "b", "c"], 0))
            .await
            .unwrap_err();
        assert!(matches!(err, QuestionBankError::Validation(_)));

        let err = bank
            .add(QuestionDraft::new("Q", ["a", "b", "c", "d"], 4))
            .await
            .unwrap_err();
        assert!(matches!(err, QuestionBankError::Validation(_)));
        assert_eq!(bank.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pick_on_empty_bank_fails() {
        let bank = bank();
        let err = bank.pick_random_unseen().await.unwrap_err();
        assert!(matches!(err, QuestionBankError::EmptyBank));
    }

    #[tokio::test]
    async fn picks_do_not_repeat_until_cycle_resets() {
        let bank = bank();
        bank.ensure_seeded().await.unwrap();
        let total = usize::try_from(bank.count().await.unwrap()).unwrap();

        let mut seen = HashSet::new();
        for _ in 0..total {
            let question = bank.pick_random_unseen().await.unwrap();
            assert!(seen.insert(question.id()));
        }
        assert_eq!(bank.shown_len().await, total);

        bank.pick_random_unseen().await.unwrap();
        assert_eq!(bank.shown_len().await, 1);
    }

    #[tokio::test]
    async fn same_seed_gives_same_sequence() {
        let repo = Arc::new(InMemoryRepository::new());
        let first = QuestionBank::new(repo.clone()).with_seed(99);
        let second = QuestionBank::new(repo).with_seed(99);
        first.ensure_seeded().await.unwrap();

        for _ in 0..10 {
            let a = first.pick_random_unseen().await.unwrap();
            let b = second.pick_random_unseen().await.unwrap();
            assert_eq!(a.id(), b.id());
        }
    }

    #[tokio::test]
    async fn added_question_joins_rotation() {
        let bank = bank();
        let id = bank
            .add(QuestionDraft::new("Only one?", ["a", "b", "c", "d"], 0))
            .await
            .unwrap();
        for _ in 0..3 {
            assert_eq!(bank.pick_random_unseen().await.unwrap().id(), id);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shared_bank_serializes_concurrent_callers() {
        let bank = Arc::new(bank());

        let seeders: Vec<_> = (0..8)
            .map(|_| {
                let bank = Arc::clone(&bank);
                tokio::spawn(async move { bank.ensure_seeded().await })
            })
            .collect();
        let mut inserted = 0;
        for seeder in seeders {
            if seeder.await.unwrap().unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(bank.count().await.unwrap(), 10);

        let pickers: Vec<_> = (0..10)
            .map(|_| {
                let bank = Arc::clone(&bank);
                tokio::spawn(async move { bank.pick_random_unseen().await })
            })
            .collect();
        let mut ids = HashSet::new();
        for picker in pickers {
            ids.insert(picker.await.unwrap().unwrap().id());
        }
        assert_eq!(ids.len(), 10);
        assert_eq!(bank.shown_len().await, 10);
    }

    /// Lists ids normally but never answers a lookup.
    struct HangingLookups(InMemoryRepository);

    #[async_trait]
    impl QuestionRepository for HangingLookups {
        async fn count_questions(&self) -> Result<u64, StorageError> {
            self.0.count_questions().await
        }

        async fn insert_question(
            &self,
            question: &ValidatedQuestion,
        ) -> Result<QuestionId, StorageError> {
            self.0.insert_question(question).await
        }

        async fn insert_questions(
            &self,
            questions: &[ValidatedQuestion],
        ) -> Result<Vec<QuestionId>, StorageError> {
            self.0.insert_questions(questions).await
        }

        async fn question_ids(&self) -> Result<Vec<QuestionId>, StorageError> {
            self.0.question_ids().await
        }

        async fn get_question(&self, _id: QuestionId) -> Result<Question, StorageError> {
            std::future::pending().await
        }

        async fn list_questions(&self, limit: u32) -> Result<Vec<Question>, StorageError> {
            self.0.list_questions(limit).await
        }
    }

    #[tokio::test]
    async fn cancelled_pick_releases_its_id() {
        let bank = QuestionBank::new(Arc::new(HangingLookups(InMemoryRepository::new())))
            .with_timeout(Duration::from_secs(5));
        bank.add(QuestionDraft::new("Q", ["a", "b", "c", "d"], 0))
            .await
            .unwrap();

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), bank.pick_random_unseen()).await;
        assert!(cancelled.is_err());
        assert_eq!(bank.shown_len().await, 0);
    }

    #[tokio::test]
    async fn timed_out_lookup_releases_its_id() {
        let bank = QuestionBank::new(Arc::new(HangingLookups(InMemoryRepository::new())))
            .with_timeout(Duration::from_millis(20));
        bank.add(QuestionDraft::new("Q", ["a", "b", "c", "d"], 0))
            .await
            .unwrap();

        let err = bank.pick_random_unseen().await.unwrap_err();
        assert!(matches!(
            err,
            QuestionBankError::Storage(StorageError::Timeout(_))
        ));
        assert_eq!(bank.shown_len().await, 0);
    }

    struct StalledRepository;

    #[async_trait]
    impl QuestionRepository for StalledRepository {
        async fn count_questions(&self) -> Result<u64, StorageError> {
            std::future::pending().await
        }

        async fn insert_question(
            &self,
            _question: &ValidatedQuestion,
        ) -> Result<QuestionId, StorageError> {
            std::future::pending().await
        }

        async fn insert_questions(
            &self,
            _questions: &[ValidatedQuestion],
        ) -> Result<Vec<QuestionId>, StorageError> {
            std::future::pending().await
        }

        async fn question_ids(&self) -> Result<Vec<QuestionId>, StorageError> {
            std::future::pending().await
        }

        async fn get_question(&self, _id: QuestionId) -> Result<Question, StorageError> {
            std::future::pending().await
        }

        async fn list_questions(&self, _limit: u32) -> Result<Vec<Question>, StorageError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_storage_times_out() {
        let bank =
            QuestionBank::new(Arc::new(StalledRepository)).with_timeout(Duration::from_millis(20));

        let err = bank.pick_random_unseen().await.unwrap_err();
        assert!(matches!(
            err,
            QuestionBankError::Storage(StorageError::Timeout(_))
        ));

        let err = bank.count().await.unwrap_err();
        assert!(matches!(
            err,
            QuestionBankError::Storage(StorageError::Timeout(_))
        ));
    }
}
