use super::contains_pattern;
use crate::error::{AppError, Result};
use crate::models::Follow;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Insert the edge `user_id -> author_id`.
    ///
    /// Returns `false` when the edge already exists, including when a concurrent
    /// writer won the race on the unique constraint.
    async fn create(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Returns `true` if an edge was removed.
    async fn delete(&self, user_id: i64, author_id: i64) -> Result<bool>;

    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Outgoing edges of `user_id`, optionally narrowed to followed usernames
    /// containing `search`.
    async fn list_for_user(&self, user_id: i64, search: Option<&str>) -> Result<Vec<Follow>>;

    /// How many users `user_id` follows.
    async fn following_count(&self, user_id: i64) -> Result<i64>;

    /// How many users follow `user_id`.
    async fn follower_count(&self, user_id: i64) -> Result<i64>;
}

/// Repository for follow edges backed by PostgreSQL
#[derive(Clone)]
pub struct PgFollowRepository {
    pool: PgPool,
}

impl PgFollowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FollowRepository for PgFollowRepository {
    async fn create(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let result = sqlx::query("INSERT INTO follows (user_id, author_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                debug!(user_id, author_id, "Created follow edge");
                Ok(true)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                debug!(user_id, author_id, "Follow edge already exists");
                Ok(false)
            }
            Err(sqlx::Error::Database(db)) if db.is_check_violation() => Err(AppError::invalid(
                "author",
                "You cannot follow yourself.",
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_for_user(&self, user_id: i64, search: Option<&str>) -> Result<Vec<Follow>> {
        let follows = sqlx::query_as::<_, Follow>(
            r#"
            SELECT f.id, f.user_id, fu.username AS "user", f.author_id, au.username AS author
            FROM follows f
            JOIN users fu ON fu.id = f.user_id
            JOIN users au ON au.id = f.author_id
            WHERE f.user_id = $1
              AND ($2::TEXT IS NULL OR au.username ILIKE $2)
            ORDER BY f.id
            "#,
        )
        .bind(user_id)
        .bind(search.map(contains_pattern))
        .fetch_all(&self.pool)
        .await?;

        Ok(follows)
    }

    async fn following_count(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn follower_count(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE author_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
