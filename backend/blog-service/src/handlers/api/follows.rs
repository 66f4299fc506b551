/// Follow handlers - the caller's own edges under `/api/v1/follow/`
use crate::error::{AppError, Result};
use crate::middleware::UserId;
use crate::models::Follow;
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct FollowListQuery {
    /// Substring of the followed username
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FollowPayload {
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowResponse {
    pub user: String,
    pub author: String,
}

impl From<Follow> for FollowResponse {
    fn from(follow: Follow) -> Self {
        Self {
            user: follow.user,
            author: follow.author,
        }
    }
}

pub async fn list_follows(
    state: web::Data<AppState>,
    user: UserId,
    query: web::Query<FollowListQuery>,
) -> Result<HttpResponse> {
    let follows = state
        .follows
        .list_following(user.0, query.search.as_deref())
        .await?;
    let body: Vec<FollowResponse> = follows.into_iter().map(FollowResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// Follow an author by username; self and repeat follows are field errors
pub async fn create_follow(
    state: web::Data<AppState>,
    user: UserId,
    payload: web::Json<FollowPayload>,
) -> Result<HttpResponse> {
    let username = payload
        .into_inner()
        .author
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .ok_or_else(|| AppError::invalid("author", "This field is required."))?;

    let follower = state
        .store
        .users
        .find_by_id(user.0)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let (author, outcome) = match state.follows.follow(user.0, &username).await {
        Ok(result) => result,
        Err(AppError::NotFound(_)) => {
            return Err(AppError::invalid(
                "author",
                format!("Object with username={} does not exist.", username),
            ))
        }
        Err(e) => return Err(e),
    };
    outcome.into_result()?;

    Ok(HttpResponse::Created().json(FollowResponse {
        user: follower.username,
        author: author.username,
    }))
}

pub async fn delete_follow(
    state: web::Data<AppState>,
    user: UserId,
    username: web::Path<String>,
) -> Result<HttpResponse> {
    let (_, removed) = state.follows.unfollow(user.0, &username).await?;
    if !removed {
        return Err(AppError::NotFound(format!(
            "follow of '{}'",
            username.as_str()
        )));
    }
    Ok(HttpResponse::NoContent().finish())
}
