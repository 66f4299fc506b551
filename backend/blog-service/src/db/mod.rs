/// Database access layer
///
/// This module provides:
/// - Repository traits for users, groups, posts, comments and follow edges
/// - PostgreSQL implementations (the production store)
/// - An in-memory implementation used for local development and tests
/// - Connection pool construction
///
/// Cascades are part of each `delete` contract and are carried out explicitly
/// inside a single transaction, never left to the schema alone.
pub mod comment_repo;
pub mod follow_repo;
pub mod group_repo;
pub mod memory;
pub mod pool;
pub mod post_repo;
pub mod user_repo;

pub use comment_repo::{CommentRepository, PgCommentRepository};
pub use follow_repo::{FollowRepository, PgFollowRepository};
pub use group_repo::{GroupRepository, PgGroupRepository};
pub use memory::MemoryStore;
pub use pool::create_pool;
pub use post_repo::{PgPostRepository, PostFilter, PostRepository};
pub use user_repo::{PgUserRepository, UserRepository};

use crate::error::Result;
use sqlx::PgPool;
use std::sync::Arc;

/// Bundle of repositories handed to the service layer.
#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn UserRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub follows: Arc<dyn FollowRepository>,
    pool: Option<PgPool>,
}

impl Store {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            groups: Arc::new(PgGroupRepository::new(pool.clone())),
            posts: Arc::new(PgPostRepository::new(pool.clone())),
            comments: Arc::new(PgCommentRepository::new(pool.clone())),
            follows: Arc::new(PgFollowRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    pub fn in_memory() -> Self {
        let memory = MemoryStore::new();
        Self {
            users: Arc::new(memory.clone()),
            groups: Arc::new(memory.clone()),
            posts: Arc::new(memory.clone()),
            comments: Arc::new(memory.clone()),
            follows: Arc::new(memory),
            pool: None,
        }
    }

    /// Round-trip to the backing database; always healthy in memory.
    pub async fn health_check(&self) -> Result<()> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").fetch_one(pool).await?;
        }
        Ok(())
    }
}

/// Case-insensitive "contains" pattern for ILIKE with wildcards escaped.
pub(crate) fn contains_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
