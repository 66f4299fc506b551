/// Comment handlers - `/api/v1/posts/{post_id}/comments/`
use crate::error::Result;
use crate::middleware::UserId;
use crate::models::Comment;
use crate::AppState;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CommentPayload {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: i64,
    pub author: String,
    pub post: i64,
    pub text: String,
    pub created: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            author: comment.author,
            post: comment.post_id,
            text: comment.text,
            created: comment.created,
        }
    }
}

/// Comments on a post, oldest first
pub async fn list_comments(
    state: web::Data<AppState>,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let comments = state.comments.list_for_post(*post_id).await?;
    let body: Vec<CommentResponse> = comments.into_iter().map(CommentResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// Comment on a post; author and post come from the request, not the body
pub async fn create_comment(
    state: web::Data<AppState>,
    user: UserId,
    post_id: web::Path<i64>,
    payload: web::Json<CommentPayload>,
) -> Result<HttpResponse> {
    let post = state.posts.get(*post_id).await?;
    let text = payload.into_inner().text.unwrap_or_default();
    let comment = state.comments.create(Some(user.0), &post, &text).await?;
    Ok(HttpResponse::Created().json(CommentResponse::from(comment)))
}

pub async fn get_comment(
    state: web::Data<AppState>,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    let comment = state.comments.get(post_id, comment_id).await?;
    Ok(HttpResponse::Ok().json(CommentResponse::from(comment)))
}

/// PUT and PATCH behave alike: `text` is the only writable field.
pub async fn update_comment(
    state: web::Data<AppState>,
    user: UserId,
    path: web::Path<(i64, i64)>,
    payload: web::Json<CommentPayload>,
) -> Result<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    let text = match payload.into_inner().text {
        Some(text) => text,
        None => state.comments.get(post_id, comment_id).await?.text,
    };
    let comment = state
        .comments
        .update(Some(user.0), post_id, comment_id, &text)
        .await?;
    Ok(HttpResponse::Ok().json(CommentResponse::from(comment)))
}

pub async fn delete_comment(
    state: web::Data<AppState>,
    user: UserId,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    state
        .comments
        .delete(Some(user.0), post_id, comment_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
