use quiz_core::model::{Question, QuestionId, ValidatedQuestion};

use super::{
    SqliteRepository,
    mapping::{map_question_row, question_id_from_i64, question_id_to_i64},
};
use crate::repository::{QuestionRepository, StorageError};

const INSERT_QUESTION: &str = r"
    INSERT INTO questions (
        question_text, option_1, option_2, option_3, option_4, correct_option
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
";

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

async fn insert_one<'e, E>(executor: E, question: &ValidatedQuestion) -> Result<QuestionId, StorageError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let [o1, o2, o3, o4] = question.options();
    let result = sqlx::query(INSERT_QUESTION)
        .bind(question.text())
        .bind(o1.as_str())
        .bind(o2.as_str())
        .bind(o3.as_str())
        .bind(o4.as_str())
        .bind(i64::from(question.correct_index()))
        .execute(executor)
        .await
        .map_err(conn)?;
    question_id_from_i64(result.last_insert_rowid())
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn count_questions(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        u64::try_from(count)
            .map_err(|_| StorageError::Serialization(format!("invalid count: {count}")))
    }

    async fn insert_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        insert_one(&self.pool, question).await
    }

    async fn insert_questions(
        &self,
        questions: &[ValidatedQuestion],
    ) -> Result<Vec<QuestionId>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let mut ids = Vec::with_capacity(questions.len());
        for question in questions {
            ids.push(insert_one(&mut *tx, question).await?);
        }
        tx.commit().await.map_err(conn)?;
        Ok(ids)
    }

    async fn question_ids(&self) -> Result<Vec<QuestionId>, StorageError> {
        let rows: Vec<i64> = sqlx::query_scalar("SELECT id FROM questions ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.into_iter().map(question_id_from_i64).collect()
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, question_text, option_1, option_2, option_3, option_4, correct_option
            FROM questions
            WHERE id = ?1
            ",
        )
        .bind(question_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_question_row(&row)
    }

    async fn list_questions(&self, limit: u32) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, question_text, option_1, option_2, option_3, option_4, correct_option
            FROM questions
            ORDER BY id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            questions.push(map_question_row(&row)?);
        }
        Ok(questions)
    }
}
