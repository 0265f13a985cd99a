//! User repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::User;

/// Fields required to create an account. The password arrives pre-hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub qualification: Option<String>,
    pub dob: Option<NaiveDate>,
}

/// Repository for user operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Find a user by ID.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Find a user by username (email).
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Create a new unverified user.
    async fn create(&self, new_user: NewUser) -> Result<User>;

    /// Mark a user verified and activate the account. Returns false when
    /// the user does not exist.
    async fn mark_verified(&self, id: Uuid) -> Result<bool>;

    /// Replace a user's password hash.
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool>;

    /// Record a successful login.
    async fn touch_last_login(&self, id: Uuid) -> Result<()>;

    /// Delete a user by ID (returns true if it existed).
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// PostgreSQL implementation of UserRepo.
#[derive(Clone)]
pub struct PgUserRepo {
    pool: Pool<Postgres>,
}

impl PgUserRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, full_name, qualification, dob)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(&new_user.full_name)
        .bind(&new_user.qualification)
        .bind(new_user.dob)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn mark_verified(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET verified_at = now(), status = 'active' WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
