use async_trait::async_trait;
use quiz_core::model::{Question, QuestionId, ValidatedQuestion};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage did not respond within {0:?}")]
    Timeout(Duration),
}

/// Repository contract for the question bank.
///
/// Implementations only store and fetch; validation happens before a
/// `ValidatedQuestion` can exist, and selection policy lives in the services layer.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Total number of stored questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn count_questions(&self) -> Result<u64, StorageError>;

    /// Store a question under the next available id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn insert_question(&self, question: &ValidatedQuestion)
    -> Result<QuestionId, StorageError>;

    /// Store several questions atomically, returning their ids in input order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any question cannot be stored; nothing is kept in that case.
    async fn insert_questions(
        &self,
        questions: &[ValidatedQuestion],
    ) -> Result<Vec<QuestionId>, StorageError>;

    /// Ids of every stored question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn question_ids(&self) -> Result<Vec<QuestionId>, StorageError>;

    /// Fetch a question by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError>;

    /// List up to `limit` questions ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn list_questions(&self, limit: u32) -> Result<Vec<Question>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<BTreeMap<QuestionId, Question>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            questions: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

fn next_id(map: &BTreeMap<QuestionId, Question>) -> QuestionId {
    let last = map.keys().next_back().map_or(0, QuestionId::value);
    QuestionId::new(last + 1)
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn count_questions(&self) -> Result<u64, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.len() as u64)
    }

    async fn insert_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = next_id(&guard);
        guard.insert(id, question.clone().assign_id(id));
        Ok(id)
    }

    async fn insert_questions(
        &self,
        questions: &[ValidatedQuestion],
    ) -> Result<Vec<QuestionId>, StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut ids = Vec::with_capacity(questions.len());
        for question in questions {
            let id = next_id(&guard);
            guard.insert(id, question.clone().assign_id(id));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn question_ids(&self) -> Result<Vec<QuestionId>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.keys().copied().collect())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_questions(&self, limit: u32) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(guard.values().take(limit).cloned().collect())
    }
}

/// Holds the question repository behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let questions: Arc<dyn QuestionRepository> = Arc::new(InMemoryRepository::new());
        Self { questions }
    }
}
