//! Score repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::Score;

/// Repository for quiz attempt scores.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScoreRepo: Send + Sync {
    /// A user's attempts, newest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Score>>;

    /// Record a completed attempt.
    async fn record(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
        total_scored: i32,
        total_questions: i32,
    ) -> Result<Score>;
}

/// PostgreSQL implementation of ScoreRepo.
#[derive(Clone)]
pub struct PgScoreRepo {
    pool: Pool<Postgres>,
}

impl PgScoreRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScoreRepo for PgScoreRepo {
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Score>> {
        let scores = sqlx::query_as::<_, Score>(
            "SELECT * FROM scores WHERE user_id = $1 ORDER BY attempted_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(scores)
    }

    async fn record(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
        total_scored: i32,
        total_questions: i32,
    ) -> Result<Score> {
        let score = sqlx::query_as::<_, Score>(
            r#"
            INSERT INTO scores (user_id, quiz_id, total_scored, total_questions)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(quiz_id)
        .bind(total_scored)
        .bind(total_questions)
        .fetch_one(&self.pool)
        .await?;
        Ok(score)
    }
}
