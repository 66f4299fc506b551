use super::contains_pattern;
use crate::error::{AppError, Result};
use crate::models::{NewUser, User};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Fails with a `username` validation error when the name is taken.
    async fn create(&self, user: NewUser) -> Result<User>;

    /// Remove a user together with their posts (and those posts' comments),
    /// their own comments and every follow edge touching them.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Users whose username, first name or last name contains `query`,
    /// case-insensitively, each user at most once, in id order.
    async fn search(&self, query: &str) -> Result<Vec<User>>;

    async fn count(&self) -> Result<i64>;
}

/// Repository for users backed by PostgreSQL
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
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, first_name, last_name, date_joined
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, first_name, last_name, date_joined
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, first_name, last_name)
            VALUES ($1, $2, $3)
            RETURNING id, username, first_name, last_name, date_joined
            "#,
        )
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::invalid("username", "A user with that username already exists.")
            }
            other => other.into(),
        })?;

        Ok(created)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM comments WHERE post_id IN (SELECT id FROM posts WHERE author_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM comments WHERE author_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM follows WHERE user_id = $1 OR author_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM posts WHERE author_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        debug!(user_id = id, removed, "Deleted user with cascade");
        Ok(removed > 0)
    }

    async fn search(&self, query: &str) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, first_name, last_name, date_joined
            FROM users
            WHERE username ILIKE $1 OR first_name ILIKE $1 OR last_name ILIKE $1
            ORDER BY id
            "#,
        )
        .bind(contains_pattern(query))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
