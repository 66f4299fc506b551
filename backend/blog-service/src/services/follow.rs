/// Social graph service - follow edges between users
///
/// Edges are directed and unique per ordered pair. Following yourself is never
/// stored; the outcome is reported so each surface can decide how loud to be.
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::metrics::FOLLOW_EVENTS_TOTAL;
use crate::models::{Follow, User};
use tracing::info;

/// What a follow request did to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollow,
}

impl FollowOutcome {
    fn label(self) -> &'static str {
        match self {
            FollowOutcome::Created => "follow",
            FollowOutcome::AlreadyFollowing => "follow_duplicate",
            FollowOutcome::SelfFollow => "follow_self",
        }
    }

    /// Strict form used by the API: anything but a new edge is a field error on `author`.
    pub fn into_result(self) -> Result<()> {
        match self {
            FollowOutcome::Created => Ok(()),
            FollowOutcome::AlreadyFollowing => Err(AppError::invalid(
                "author",
                "You are already following this author.",
            )),
            FollowOutcome::SelfFollow => {
                Err(AppError::invalid("author", "You cannot follow yourself."))
            }
        }
    }
}

#[derive(Clone)]
pub struct FollowService {
    store: Store,
}

impl FollowService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    async fn author(&self, username: &str) -> Result<User> {
        self.store
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{}'", username)))
    }

    /// Follow `username` on behalf of `follower_id`.
    pub async fn follow(&self, follower_id: i64, username: &str) -> Result<(User, FollowOutcome)> {
        let author = self.author(username).await?;

        let outcome = if author.id == follower_id {
            FollowOutcome::SelfFollow
        } else if self.store.follows.create(follower_id, author.id).await? {
            info!(follower_id, author_id = author.id, "Follow edge created");
            FollowOutcome::Created
        } else {
            FollowOutcome::AlreadyFollowing
        };

        FOLLOW_EVENTS_TOTAL.with_label_values(&[outcome.label()]).inc();
        Ok((author, outcome))
    }

    /// Remove the edge if present. Returns whether an edge was removed.
    pub async fn unfollow(&self, follower_id: i64, username: &str) -> Result<(User, bool)> {
        let author = self.author(username).await?;
        let removed = self.store.follows.delete(follower_id, author.id).await?;

        if removed {
            info!(follower_id, author_id = author.id, "Follow edge removed");
        }
        FOLLOW_EVENTS_TOTAL
            .with_label_values(&[if removed { "unfollow" } else { "unfollow_absent" }])
            .inc();
        Ok((author, removed))
    }

    pub async fn is_following(&self, follower: Option<i64>, author_id: i64) -> Result<bool> {
        match follower {
            Some(follower_id) => self.store.follows.exists(follower_id, author_id).await,
            None => Ok(false),
        }
    }

    pub async fn following_count(&self, user_id: i64) -> Result<i64> {
        self.store.follows.following_count(user_id).await
    }

    pub async fn follower_count(&self, user_id: i64) -> Result<i64> {
        self.store.follows.follower_count(user_id).await
    }

    /// Outgoing edges of `follower_id`, optionally narrowed by the followed username.
    pub async fn list_following(
        &self,
        follower_id: i64,
        search: Option<&str>,
    ) -> Result<Vec<Follow>> {
        let search = search.map(str::trim).filter(|q| !q.is_empty());
        self.store.follows.list_for_user(follower_id, search).await
    }
}
