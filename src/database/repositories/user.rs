use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::{RepositoryError, UserRepository};
use crate::models::{UserRecord, UserUpdate};

/// Postgres 用户存储库，表名沿用 user_details
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_details (
                user_id BIGINT PRIMARY KEY,
                username TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert(&self, record: &UserRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_details (user_id, username, email, phone, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(record.user_id)
        .bind(&record.username)
        .bind(&record.email)
        .bind(&record.phone)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(record.user_id));
        }
        tracing::debug!(user_id = record.user_id, "Inserted user");
        Ok(())
    }

    async fn update(&self, user_id: i64, update: &UserUpdate) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE user_details
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone)
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(&update.username)
        .bind(&update.email)
        .bind(&update.phone)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, user_id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM user_details WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch(&self, user_id: i64) -> Result<Option<UserRecord>, RepositoryError> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT user_id, username, email, phone, created_at
            FROM user_details
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
