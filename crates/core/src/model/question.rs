use thiserror::Error;

use crate::model::ids::QuestionId;

/// Every question offers exactly this many answer options.
pub const OPTION_COUNT: usize = 4;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("a question must have exactly 4 options, got {len}")]
    WrongOptionCount { len: usize },

    #[error("option {index} cannot be empty")]
    EmptyOption { index: usize },

    #[error("correct option index must be between 0 and 3, got {index}")]
    CorrectIndexOutOfRange { index: i64 },
}

//
// ─── QUESTION TYPES ────────────────────────────────────────────────────────────
//

/// Unvalidated question input, as typed by a user or read from a seed list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: i64,
}

impl QuestionDraft {
    #[must_use]
    pub fn new<S: Into<String>>(
        text: impl Into<String>,
        options: impl IntoIterator<Item = S>,
        correct_index: i64,
    ) -> Self {
        Self {
            text: text.into(),
            options: options.into_iter().map(Into::into).collect(),
            correct_index,
        }
    }

    /// Check the record invariants and normalize whitespace.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text or any option is blank, if there are not
    /// exactly four options, or if `correct_index` is outside `0..=3`.
    pub fn validate(self) -> Result<ValidatedQuestion, QuestionError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let len = self.options.len();
        let options: [String; OPTION_COUNT] = self
            .options
            .try_into()
            .map_err(|_| QuestionError::WrongOptionCount { len })?;

        let options = options.map(|option| option.trim().to_owned());
        if let Some(index) = options.iter().position(String::is_empty) {
            return Err(QuestionError::EmptyOption { index });
        }

        let correct_index = u8::try_from(self.correct_index)
            .ok()
            .filter(|i| usize::from(*i) < OPTION_COUNT)
            .ok_or(QuestionError::CorrectIndexOutOfRange {
                index: self.correct_index,
            })?;

        Ok(ValidatedQuestion {
            text: text.to_owned(),
            options,
            correct_index,
        })
    }
}

/// A question that satisfies every invariant but has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    text: String,
    options: [String; OPTION_COUNT],
    correct_index: u8,
}

impl ValidatedQuestion {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    #[must_use]
    pub fn correct_index(&self) -> u8 {
        self.correct_index
    }

    #[must_use]
    pub fn assign_id(self, id: QuestionId) -> Question {
        Question {
            id,
            text: self.text,
            options: self.options,
            correct_index: self.correct_index,
        }
    }
}

/// A stored multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    options: [String; OPTION_COUNT],
    correct_index: u8,
}

impl Question {
    /// Rehydrate a question from persisted fields.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the stored row violates the record invariants.
    pub fn from_persisted(
        id: QuestionId,
        text: String,
        options: Vec<String>,
        correct_index: i64,
    ) -> Result<Self, QuestionError> {
        QuestionDraft {
            text,
            options,
            correct_index,
        }
        .validate()
        .map(|validated| validated.assign_id(id))
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    #[must_use]
    pub fn correct_index(&self) -> u8 {
        self.correct_index
    }

    #[must_use]
    pub fn correct_option(&self) -> &str {
        &self.options[usize::from(self.correct_index)]
    }

    #[must_use]
    pub fn is_correct(&self, selected: u8) -> bool {
        selected == self.correct_index
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
