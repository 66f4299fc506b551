use crate::error::{AppError, Result};
use crate::models::{Group, NewGroup};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Group>>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>>;

    /// Groups in id order; `limit = None` returns everything after `offset`.
    async fn list(&self, limit: Option<i64>, offset: i64) -> Result<Vec<Group>>;

    async fn count(&self) -> Result<i64>;

    /// Fails with a `slug` validation error when the slug is taken.
    async fn create(&self, group: NewGroup) -> Result<Group>;

    /// Detach the group's posts (they keep existing without a group), then
    /// remove the group.
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// Repository for groups backed by PostgreSQL
#[derive(Clone)]
pub struct PgGroupRepository {
    pool: PgPool,
}

impl PgGroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupRepository for PgGroupRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, slug, title, description FROM groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, slug, title, description FROM groups WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group)
    }

    async fn list(&self, limit: Option<i64>, offset: i64) -> Result<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT id, slug, title, description
            FROM groups
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(groups)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM groups")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn create(&self, group: NewGroup) -> Result<Group> {
        let created = sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (slug, title, description)
            VALUES ($1, $2, $3)
            RETURNING id, slug, title, description
            "#,
        )
        .bind(&group.slug)
        .bind(&group.title)
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::invalid("slug", "A group with this slug already exists.")
            }
            other => other.into(),
        })?;

        Ok(created)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let detached = sqlx::query("UPDATE posts SET group_id = NULL WHERE group_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let removed = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        debug!(group_id = id, detached, "Deleted group");
        Ok(removed > 0)
    }
}
