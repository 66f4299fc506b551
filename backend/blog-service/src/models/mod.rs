/// Data models for blog-service
///
/// Entities are read back from the store fully resolved: a `Post` carries its
/// author's username and a `Comment`/`Follow` carries the usernames on both ends,
/// so callers never need a second lookup to present them.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered account. Identity and credentials live in the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: DateTime<Utc>,
}

/// Community that posts may be filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    /// Username of the author
    pub author: String,
    pub group_id: Option<i64>,
    /// Storage path of the attached image
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    /// Username of the author
    pub author: String,
    pub text: String,
    pub created: DateTime<Utc>,
}

/// Directed edge: `user` follows `author`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follow {
    pub id: i64,
    pub user_id: i64,
    pub user: String,
    pub author_id: i64,
    pub author: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewGroup {
    pub slug: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// Complete replacement of a post's mutable columns.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
}
