/// Comment service - handles comment creation, retrieval, and management
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::metrics::{CONTENT_MUTATION_TOTAL, OWNERSHIP_DENIED_TOTAL};
use crate::middleware::check_comment_ownership;
use crate::models::{Comment, NewComment, Post};
use tracing::{info, warn};
use validator::Validate;

#[derive(Debug, Clone, Validate)]
struct CommentText {
    #[validate(length(min = 1, message = "This field is required."))]
    text: String,
}

fn clean_text(text: &str) -> Result<String> {
    let cleaned = CommentText {
        text: text.trim().to_string(),
    };
    cleaned.validate()?;
    Ok(cleaned.text)
}

#[derive(Clone)]
pub struct CommentService {
    store: Store,
}

impl CommentService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Comments on a post, oldest first
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        if self.store.posts.find_by_id(post_id).await?.is_none() {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }
        self.store.comments.list_for_post(post_id).await
    }

    /// Get a comment that belongs to `post_id`
    pub async fn get(&self, post_id: i64, comment_id: i64) -> Result<Comment> {
        match self.store.comments.find_by_id(comment_id).await? {
            Some(comment) if comment.post_id == post_id => Ok(comment),
            _ => Err(AppError::NotFound(format!(
                "comment {} on post {}",
                comment_id, post_id
            ))),
        }
    }

    /// Add a comment to `post` authored by `actor`.
    pub async fn create(&self, actor: Option<i64>, post: &Post, text: &str) -> Result<Comment> {
        let author_id = actor.ok_or(AppError::Unauthenticated)?;
        let text = clean_text(text)?;

        let comment = self
            .store
            .comments
            .create(NewComment {
                post_id: post.id,
                author_id,
                text,
            })
            .await?;

        CONTENT_MUTATION_TOTAL
            .with_label_values(&["comment", "create"])
            .inc();
        info!(
            comment_id = comment.id,
            post_id = post.id,
            author_id,
            "Comment created"
        );
        Ok(comment)
    }

    fn guard(&self, user_id: i64, comment: &Comment, action: &str) -> Result<()> {
        check_comment_ownership(user_id, comment).map_err(|e| {
            OWNERSHIP_DENIED_TOTAL
                .with_label_values(&["comment", action])
                .inc();
            warn!(
                comment_id = comment.id,
                user_id, action, "Comment mutation refused: not the author"
            );
            e
        })
    }

    /// Replace a comment's text; author only.
    pub async fn update(
        &self,
        actor: Option<i64>,
        post_id: i64,
        comment_id: i64,
        text: &str,
    ) -> Result<Comment> {
        let user_id = actor.ok_or(AppError::Unauthenticated)?;
        let comment = self.get(post_id, comment_id).await?;
        self.guard(user_id, &comment, "edit")?;
        let text = clean_text(text)?;

        let updated = self
            .store
            .comments
            .update(comment.id, &text)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("comment {}", comment_id)))?;

        CONTENT_MUTATION_TOTAL
            .with_label_values(&["comment", "edit"])
            .inc();
        Ok(updated)
    }

    /// Delete a comment; author only.
    pub async fn delete(&self, actor: Option<i64>, post_id: i64, comment_id: i64) -> Result<()> {
        let user_id = actor.ok_or(AppError::Unauthenticated)?;
        let comment = self.get(post_id, comment_id).await?;
        self.guard(user_id, &comment, "delete")?;

        if !self.store.comments.delete(comment.id).await? {
            return Err(AppError::NotFound(format!("comment {}", comment_id)));
        }

        CONTENT_MUTATION_TOTAL
            .with_label_values(&["comment", "delete"])
            .inc();
        info!(comment_id, post_id, user_id, "Comment deleted");
        Ok(())
    }
}
