//! Shared fixtures for blog-service integration tests
//!
//! Every test gets its own in-memory store and a temporary media directory.
#![allow(dead_code)]

use actix_web::web;
use blog_service::db::Store;
use blog_service::media::LocalMediaStorage;
use blog_service::middleware::issue_token;
use blog_service::models::{Group, NewGroup, NewUser, Post, User};
use blog_service::services::PostInput;
use blog_service::AppState;
use std::sync::Arc;
use tempfile::TempDir;

pub const SECRET: &str = "integration-test-secret-integration-test";
pub const LOGIN_URL: &str = "/auth/login/";
pub const PAGE_SIZE: usize = 10;

/// 2x1 GIF.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

pub struct TestContext {
    pub state: web::Data<AppState>,
    /// Kept alive for the duration of the test
    pub media_dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let media_dir = tempfile::tempdir().expect("create media dir");
        let media = Arc::new(LocalMediaStorage::new(media_dir.path()));
        let state = AppState::new(
            Store::in_memory(),
            media,
            PAGE_SIZE,
            1024 * 1024,
            LOGIN_URL,
        );
        Self {
            state: web::Data::new(state),
            media_dir,
        }
    }

    pub async fn user(&self, username: &str) -> User {
        self.state
            .users
            .create(NewUser {
                username: username.to_string(),
                ..Default::default()
            })
            .await
            .expect("create user")
    }

    pub async fn group(&self, slug: &str) -> Group {
        self.state
            .groups
            .create(NewGroup {
                slug: slug.to_string(),
                title: format!("Group {}", slug),
                description: "test group".to_string(),
            })
            .await
            .expect("create group")
    }

    pub async fn post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        self.state
            .posts
            .create(
                Some(author.id),
                PostInput::new(text, group.map(|g| g.id)),
            )
            .await
            .expect("create post")
    }
}

pub fn bearer(user: &User) -> (&'static str, String) {
    let token = issue_token(SECRET, user.id, 3600).expect("issue token");
    ("Authorization", format!("Bearer {}", token))
}

pub fn session_cookie(user: &User) -> actix_web::cookie::Cookie<'static> {
    let token = issue_token(SECRET, user.id, 3600).expect("issue token");
    actix_web::cookie::Cookie::new(blog_service::middleware::TOKEN_COOKIE, token)
}

/// Part of a `multipart/form-data` body.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

pub const BOUNDARY: &str = "----blogservicetestboundary";

/// Returns the content type header value and the encoded body.
pub fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

/// Build the service under test with authentication and all routes.
macro_rules! blog_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.clone())
                .wrap(blog_service::middleware::AuthMiddleware::new(
                    $crate::common::SECRET,
                ))
                .configure(blog_service::handlers::configure),
        )
        .await
    };
}

pub(crate) use blog_app;
