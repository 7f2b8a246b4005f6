#![forbid(unsafe_code)]

pub mod model;
pub mod selection;

pub use model::{
    InterruptionReason, Question, QuestionDraft, QuestionError, QuestionId, QuizSettings,
    SettingsError, ValidatedQuestion,
};
pub use selection::ExclusionSet;
