/// Post handlers - `/api/v1/posts/`
use super::nullable;
use crate::error::{AppError, Result};
use crate::media::ImageUpload;
use crate::middleware::UserId;
use crate::models::Post;
use crate::services::{ImageChange, PostInput};
use crate::AppState;
use actix_web::{web, HttpResponse};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    /// Exact author username
    pub author: Option<String>,
    /// Exact group slug
    pub group: Option<String>,
}

/// Write payload. `image` is base64, optionally as a `data:` URI.
#[derive(Debug, Default, Deserialize)]
pub struct PostPayload {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub group: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub image: Option<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author: String,
    pub group: Option<i64>,
    pub image: Option<String>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            text: post.text,
            pub_date: post.pub_date,
            author: post.author,
            group: post.group_id,
            image: post.image,
        }
    }
}

fn decode_image(encoded: &str) -> Result<ImageUpload> {
    let data = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let bytes = STANDARD.decode(data.trim()).map_err(|_| {
        AppError::invalid(
            "image",
            "Upload a valid image. The submitted data is not valid base64.",
        )
    })?;
    Ok(ImageUpload::new(None, bytes))
}

/// `None` keeps, `null` clears, a string replaces.
fn image_change(image: Option<Option<String>>) -> Result<ImageChange> {
    Ok(match image {
        None => ImageChange::Keep,
        Some(None) => ImageChange::Clear,
        Some(Some(encoded)) => ImageChange::Replace(decode_image(&encoded)?),
    })
}

/// List posts, optionally filtered by `author` and `group`
pub async fn list_posts(
    state: web::Data<AppState>,
    query: web::Query<PostListQuery>,
) -> Result<HttpResponse> {
    let posts = state
        .posts
        .list(query.author.as_deref(), query.group.as_deref())
        .await?;
    let body: Vec<PostResponse> = posts.into_iter().map(PostResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// Create a new post
pub async fn create_post(
    state: web::Data<AppState>,
    user: UserId,
    payload: web::Json<PostPayload>,
) -> Result<HttpResponse> {
    let payload = payload.into_inner();
    let input = PostInput::new(payload.text.unwrap_or_default(), payload.group.flatten())
        .with_image(image_change(payload.image)?);

    let post = state.posts.create(Some(user.0), input).await?;
    Ok(HttpResponse::Created().json(PostResponse::from(post)))
}

/// Get a post by ID
pub async fn get_post(state: web::Data<AppState>, post_id: web::Path<i64>) -> Result<HttpResponse> {
    let post = state.posts.get(*post_id).await?;
    Ok(HttpResponse::Ok().json(PostResponse::from(post)))
}

/// Full update: a missing `group` clears it, a missing `image` keeps it
pub async fn replace_post(
    state: web::Data<AppState>,
    user: UserId,
    post_id: web::Path<i64>,
    payload: web::Json<PostPayload>,
) -> Result<HttpResponse> {
    let post = state.posts.get(*post_id).await?;
    state.posts.authorize(user.0, &post, "edit")?;

    let payload = payload.into_inner();
    let input = PostInput::new(payload.text.unwrap_or_default(), payload.group.flatten())
        .with_image(image_change(payload.image)?);

    let updated = state
        .posts
        .edit(Some(user.0), post, input)
        .await?
        .into_result()?;
    Ok(HttpResponse::Ok().json(PostResponse::from(updated)))
}

/// Partial update: only the fields present change
pub async fn patch_post(
    state: web::Data<AppState>,
    user: UserId,
    post_id: web::Path<i64>,
    payload: web::Json<PostPayload>,
) -> Result<HttpResponse> {
    let post = state.posts.get(*post_id).await?;
    state.posts.authorize(user.0, &post, "edit")?;

    let payload = payload.into_inner();
    let text = payload.text.unwrap_or_else(|| post.text.clone());
    let group_id = payload.group.unwrap_or(post.group_id);
    let input = PostInput::new(text, group_id).with_image(image_change(payload.image)?);

    let updated = state
        .posts
        .edit(Some(user.0), post, input)
        .await?
        .into_result()?;
    Ok(HttpResponse::Ok().json(PostResponse::from(updated)))
}

/// Delete a post and its comments
pub async fn delete_post(
    state: web::Data<AppState>,
    user: UserId,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = state.posts.get(*post_id).await?;
    state.posts.delete(Some(user.0), post).await?.into_result()?;
    Ok(HttpResponse::NoContent().finish())
}
