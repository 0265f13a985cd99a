//! Quiz and question repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres, types::Json};
use uuid::Uuid;

use crate::models::{Question, Quiz};

/// Repository for quiz operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizRepo: Send + Sync {
    async fn list(&self) -> Result<Vec<Quiz>>;

    async fn find(&self, id: Uuid) -> Result<Option<Quiz>>;

    /// All questions of a quiz, correct answers included. Callers decide
    /// what to expose.
    async fn questions(&self, quiz_id: Uuid) -> Result<Vec<Question>>;

    async fn create<'a>(
        &self,
        chapter_id: Uuid,
        name: &'a str,
        remarks: Option<&'a str>,
        duration_minutes: i32,
    ) -> Result<Quiz>;

    async fn add_question(
        &self,
        quiz_id: Uuid,
        statement: &str,
        options: Vec<String>,
        correct_index: i32,
    ) -> Result<Question>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// PostgreSQL implementation of QuizRepo.
#[derive(Clone)]
pub struct PgQuizRepo {
    pool: Pool<Postgres>,
}

impl PgQuizRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizRepo for PgQuizRepo {
    async fn list(&self) -> Result<Vec<Quiz>> {
        let quizzes = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(quizzes)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Quiz>> {
        let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(quiz)
    }

    async fn questions(&self, quiz_id: Uuid) -> Result<Vec<Question>> {
        let questions =
            sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE quiz_id = $1")
                .bind(quiz_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(questions)
    }

    async fn create<'a>(
        &self,
        chapter_id: Uuid,
        name: &'a str,
        remarks: Option<&'a str>,
        duration_minutes: i32,
    ) -> Result<Quiz> {
        let quiz = sqlx::query_as::<_, Quiz>(
            r#"
            INSERT INTO quizzes (chapter_id, name, remarks, duration_minutes)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(chapter_id)
        .bind(name)
        .bind(remarks)
        .bind(duration_minutes)
        .fetch_one(&self.pool)
        .await?;
        Ok(quiz)
    }

    async fn add_question(
        &self,
        quiz_id: Uuid,
        statement: &str,
        options: Vec<String>,
        correct_index: i32,
    ) -> Result<Question> {
        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (quiz_id, statement, options, correct_index)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(quiz_id)
        .bind(statement)
        .bind(Json(options))
        .bind(correct_index)
        .fetch_one(&self.pool)
        .await?;
        Ok(question)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
