/// Blog Service Library
///
/// A social blogging platform: users publish posts, file them under groups,
/// comment, and follow other authors. The same domain operations are served as
/// page endpoints and as a REST API under `/api/v1/`.
///
/// # Modules
///
/// - `handlers`: page and REST API request handlers
/// - `models`: users, groups, posts, comments and follow edges
/// - `services`: feed composition, social graph, content mutation, search
/// - `db`: repository traits with PostgreSQL and in-memory implementations
/// - `media`: image validation and blob storage
/// - `middleware`: bearer/cookie authentication and the ownership guard
/// - `error`: error types and their HTTP mapping
/// - `config`: configuration management
/// - `metrics`: Prometheus collectors
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod media;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

use db::Store;
use media::MediaStorage;
use services::{
    CommentService, FeedService, FollowService, GroupService, PostService, SearchService,
    UserService,
};
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub feeds: FeedService,
    pub follows: FollowService,
    pub posts: PostService,
    pub comments: CommentService,
    pub groups: GroupService,
    pub users: UserService,
    pub search: SearchService,
    /// Where anonymous page requests are sent to sign in
    pub login_url: String,
}

impl AppState {
    pub fn new(
        store: Store,
        media: Arc<dyn MediaStorage>,
        page_size: usize,
        max_upload_bytes: usize,
        login_url: impl Into<String>,
    ) -> Self {
        Self {
            feeds: FeedService::new(store.clone(), page_size),
            follows: FollowService::new(store.clone()),
            posts: PostService::new(store.clone(), media.clone(), max_upload_bytes),
            comments: CommentService::new(store.clone()),
            groups: GroupService::new(store.clone(), page_size),
            users: UserService::new(store.clone(), media),
            search: SearchService::new(store.clone()),
            store,
            login_url: login_url.into(),
        }
    }

    pub fn from_config(store: Store, media: Arc<dyn MediaStorage>, config: &Config) -> Self {
        Self::new(
            store,
            media,
            config.feed.page_size,
            config.media.max_upload_bytes,
            config.auth.login_url.clone(),
        )
    }
}
