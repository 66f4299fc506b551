//! Case-insensitive substring search over users and posts.

use crate::db::Store;
use crate::error::Result;
use crate::models::{Post, User};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub query: String,
    /// Users matching on username, first name or last name, each once
    pub users: Vec<User>,
    /// Posts whose text contains the query
    pub posts: Vec<Post>,
}

#[derive(Clone)]
pub struct SearchService {
    store: Store,
}

impl SearchService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// A blank query matches nothing.
    pub async fn search(&self, query: &str) -> Result<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResults::default());
        }

        let users = self.store.users.search(query).await?;
        let posts = self.store.posts.search(query).await?;
        debug!(query, users = users.len(), posts = posts.len(), "Search completed");

        Ok(SearchResults {
            query: query.to_string(),
            users,
            posts,
        })
    }
}
