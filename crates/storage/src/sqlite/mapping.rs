use quiz_core::model::{Question, QuestionId};
use sqlx::Row;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    u64::try_from(v)
        .ok()
        .filter(|v| *v > 0)
        .map(QuestionId::new)
        .ok_or_else(|| StorageError::Serialization(format!("invalid question id: {v}")))
}

pub(crate) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("question_id overflow".into()))
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id = question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let options = ["option_1", "option_2", "option_3", "option_4"]
        .into_iter()
        .map(|column| row.try_get::<String, _>(column).map_err(ser))
        .collect::<Result<Vec<_>, _>>()?;

    Question::from_persisted(
        id,
        row.try_get("question_text").map_err(ser)?,
        options,
        row.try_get("correct_option").map_err(ser)?,
    )
    .map_err(ser)
}
