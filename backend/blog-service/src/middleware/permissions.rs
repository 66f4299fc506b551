/// Ownership guard
///
/// Only the author of a post (or comment) may change or remove it. Reads are
/// never gated here.
use crate::error::{AppError, Result};
use crate::models::{Comment, Post};

/// `true` when `actor` is authenticated and is the post's author.
pub fn can_modify(actor: Option<i64>, post: &Post) -> bool {
    matches!(actor, Some(id) if id == post.author_id)
}

/// Check if a user owns a post
pub fn check_post_ownership(user_id: i64, post: &Post) -> Result<()> {
    if can_modify(Some(user_id), post) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(
            "You do not have permission to modify another user's post.".to_string(),
        ))
    }
}

/// Check if a user owns a comment
pub fn check_comment_ownership(user_id: i64, comment: &Comment) -> Result<()> {
    if comment.author_id == user_id {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(
            "You do not have permission to modify another user's comment.".to_string(),
        ))
    }
}
