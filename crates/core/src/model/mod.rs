mod defaults;
mod ids;
mod interruption;
mod question;
mod settings;

pub use defaults::{DEFAULT_QUESTION_COUNT, default_questions};
pub use ids::{ParseIdError, QuestionId};
pub use interruption::{InterruptionReason, ParseReasonError};
pub use question::{OPTION_COUNT, Question, QuestionDraft, QuestionError, ValidatedQuestion};
pub use settings::{QuizSettings, SettingsError};
