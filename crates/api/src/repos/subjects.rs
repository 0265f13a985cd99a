//! Subject repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::Subject;

/// Repository for subject operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubjectRepo: Send + Sync {
    async fn list(&self) -> Result<Vec<Subject>>;

    async fn find(&self, id: Uuid) -> Result<Option<Subject>>;

    async fn create<'a>(&self, name: &'a str, description: Option<&'a str>) -> Result<Subject>;

    /// Update name/description; unspecified fields keep their value.
    /// Returns false when the subject does not exist.
    async fn update<'a>(
        &self,
        id: Uuid,
        name: Option<&'a str>,
        description: Option<&'a str>,
    ) -> Result<bool>;

    /// Delete a subject and (via FK cascade) its chapters.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// PostgreSQL implementation of SubjectRepo.
#[derive(Clone)]
pub struct PgSubjectRepo {
    pool: Pool<Postgres>,
}

impl PgSubjectRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubjectRepo for PgSubjectRepo {
    async fn list(&self) -> Result<Vec<Subject>> {
        let subjects = sqlx::query_as::<_, Subject>("SELECT * FROM subjects ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(subjects)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Subject>> {
        let subject = sqlx::query_as::<_, Subject>("SELECT * FROM subjects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(subject)
    }

    async fn create<'a>(&self, name: &'a str, description: Option<&'a str>) -> Result<Subject> {
        let subject = sqlx::query_as::<_, Subject>(
            "INSERT INTO subjects (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        Ok(subject)
    }

    async fn update<'a>(
        &self,
        id: Uuid,
        name: Option<&'a str>,
        description: Option<&'a str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subjects
            SET name = COALESCE($2, name),
                description = COALESCE($3, description)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subjects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
