//! Chapter repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::Chapter;

/// Repository for chapter operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChapterRepo: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Chapter>>;

    async fn list_by_subject(&self, subject_id: Uuid) -> Result<Vec<Chapter>>;

    async fn find(&self, id: Uuid) -> Result<Option<Chapter>>;

    async fn create<'a>(
        &self,
        subject_id: Uuid,
        name: &'a str,
        description: Option<&'a str>,
    ) -> Result<Chapter>;

    async fn update<'a>(
        &self,
        id: Uuid,
        name: Option<&'a str>,
        description: Option<&'a str>,
    ) -> Result<bool>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// PostgreSQL implementation of ChapterRepo.
#[derive(Clone)]
pub struct PgChapterRepo {
    pool: Pool<Postgres>,
}

impl PgChapterRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChapterRepo for PgChapterRepo {
    async fn list_all(&self) -> Result<Vec<Chapter>> {
        let chapters = sqlx::query_as::<_, Chapter>("SELECT * FROM chapters ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(chapters)
    }

    async fn list_by_subject(&self, subject_id: Uuid) -> Result<Vec<Chapter>> {
        let chapters = sqlx::query_as::<_, Chapter>(
            "SELECT * FROM chapters WHERE subject_id = $1 ORDER BY name",
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chapters)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Chapter>> {
        let chapter = sqlx::query_as::<_, Chapter>("SELECT * FROM chapters WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(chapter)
    }

    async fn create<'a>(
        &self,
        subject_id: Uuid,
        name: &'a str,
        description: Option<&'a str>,
    ) -> Result<Chapter> {
        let chapter = sqlx::query_as::<_, Chapter>(
            "INSERT INTO chapters (subject_id, name, description) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(subject_id)
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        Ok(chapter)
    }

    async fn update<'a>(
        &self,
        id: Uuid,
        name: Option<&'a str>,
        description: Option<&'a str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE chapters
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
        let result = sqlx::query("DELETE FROM chapters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
