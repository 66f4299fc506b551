use crate::error::Result;
use crate::models::{Comment, NewComment};
use async_trait::async_trait;
use sqlx::PgPool;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments of a post, oldest first.
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>>;

    async fn create(&self, comment: NewComment) -> Result<Comment>;

    async fn update(&self, id: i64, text: &str) -> Result<Option<Comment>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

/// Repository for comments backed by PostgreSQL
#[derive(Clone)]
pub struct PgCommentRepository {
    pool: PgPool,
}

impl PgCommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for PgCommentRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.post_id, c.author_id, u.username AS author, c.text, c.created
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.post_id, c.author_id, u.username AS author, c.text, c.created
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created ASC, c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn create(&self, comment: NewComment) -> Result<Comment> {
        let created = sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (post_id, author_id, text)
                VALUES ($1, $2, $3)
                RETURNING id, post_id, author_id, text, created
            )
            SELECT i.id, i.post_id, i.author_id, u.username AS author, i.text, i.created
            FROM inserted i
            JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.text)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(&self, id: i64, text: &str) -> Result<Option<Comment>> {
        let updated = sqlx::query_as::<_, Comment>(
            r#"
            WITH updated AS (
                UPDATE comments SET text = $2
                WHERE id = $1
                RETURNING id, post_id, author_id, text, created
            )
            SELECT d.id, d.post_id, d.author_id, u.username AS author, d.text, d.created
            FROM updated d
            JOIN users u ON u.id = d.author_id
            "#,
        )
        .bind(id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}
