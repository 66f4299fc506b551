use super::contains_pattern;
use crate::error::Result;
use crate::models::{NewPost, Post, PostChanges};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

/// Audience selector for post listings. Unset fields do not restrict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub author_id: Option<i64>,
    pub group_id: Option<i64>,
    /// Only posts whose author is followed by this user
    pub followed_by: Option<i64>,
}

impl PostFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_author(author_id: i64) -> Self {
        Self {
            author_id: Some(author_id),
            ..Self::default()
        }
    }

    pub fn by_group(group_id: i64) -> Self {
        Self {
            group_id: Some(group_id),
            ..Self::default()
        }
    }

    pub fn followed_by(user_id: i64) -> Self {
        Self {
            followed_by: Some(user_id),
            ..Self::default()
        }
    }
}

/// Every listing is ordered newest first, ties broken by ascending id.
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// `limit = None` returns everything after `offset`.
    async fn list(&self, filter: &PostFilter, limit: Option<i64>, offset: i64)
        -> Result<Vec<Post>>;

    async fn count(&self, filter: &PostFilter) -> Result<i64>;

    async fn create(&self, post: NewPost) -> Result<Post>;

    async fn update(&self, id: i64, changes: PostChanges) -> Result<Option<Post>>;

    /// Remove the post and its comments.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Posts whose text contains `query`, case-insensitively.
    async fn search(&self, query: &str) -> Result<Vec<Post>>;
}

/// Repository for posts backed by PostgreSQL
#[derive(Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.text, p.pub_date, p.author_id, u.username AS author, p.group_id, p.image
            FROM posts p
            JOIN users u ON u.id = p.author_id
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn list(
        &self,
        filter: &PostFilter,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.text, p.pub_date, p.author_id, u.username AS author, p.group_id, p.image
            FROM posts p
            JOIN users u ON u.id = p.author_id
            WHERE ($1::BIGINT IS NULL OR p.author_id = $1)
              AND ($2::BIGINT IS NULL OR p.group_id = $2)
              AND ($3::BIGINT IS NULL OR p.author_id IN (
                    SELECT f.author_id FROM follows f WHERE f.user_id = $3
                  ))
            ORDER BY p.pub_date DESC, p.id ASC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.author_id)
        .bind(filter.group_id)
        .bind(filter.followed_by)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    async fn count(&self, filter: &PostFilter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM posts p
            WHERE ($1::BIGINT IS NULL OR p.author_id = $1)
              AND ($2::BIGINT IS NULL OR p.group_id = $2)
              AND ($3::BIGINT IS NULL OR p.author_id IN (
                    SELECT f.author_id FROM follows f WHERE f.user_id = $3
                  ))
            "#,
        )
        .bind(filter.author_id)
        .bind(filter.group_id)
        .bind(filter.followed_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn create(&self, post: NewPost) -> Result<Post> {
        let created = sqlx::query_as::<_, Post>(
            r#"
            WITH inserted AS (
                INSERT INTO posts (text, author_id, group_id, image)
                VALUES ($1, $2, $3, $4)
                RETURNING id, text, pub_date, author_id, group_id, image
            )
            SELECT i.id, i.text, i.pub_date, i.author_id, u.username AS author, i.group_id, i.image
            FROM inserted i
            JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(&post.text)
        .bind(post.author_id)
        .bind(post.group_id)
        .bind(&post.image)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(&self, id: i64, changes: PostChanges) -> Result<Option<Post>> {
        let updated = sqlx::query_as::<_, Post>(
            r#"
            WITH updated AS (
                UPDATE posts
                SET text = $2, group_id = $3, image = $4
                WHERE id = $1
                RETURNING id, text, pub_date, author_id, group_id, image
            )
            SELECT d.id, d.text, d.pub_date, d.author_id, u.username AS author, d.group_id, d.image
            FROM updated d
            JOIN users u ON u.id = d.author_id
            "#,
        )
        .bind(id)
        .bind(&changes.text)
        .bind(changes.group_id)
        .bind(&changes.image)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let comments = sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let removed = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        debug!(post_id = id, comments, "Deleted post with comments");
        Ok(removed > 0)
    }

    async fn search(&self, query: &str) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.text, p.pub_date, p.author_id, u.username AS author, p.group_id, p.image
            FROM posts p
            JOIN users u ON u.id = p.author_id
            WHERE p.text ILIKE $1
            ORDER BY p.pub_date DESC, p.id ASC
            "#,
        )
        .bind(contains_pattern(query))
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }
}
