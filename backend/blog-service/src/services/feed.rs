//! Feed composition
//!
//! Four audiences share one pipeline: resolve the audience to a `PostFilter`,
//! count, clamp the requested page, then fetch that window newest first.

use crate::db::{PostFilter, Store};
use crate::error::{AppError, Result};
use crate::metrics::FEED_REQUEST_TOTAL;
use crate::models::{Group, Post, User};
use crate::services::pagination::{Page, PageRequest, Paginator};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct GroupFeed {
    pub group: Group,
    pub page: Page<Post>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileFeed {
    pub author: User,
    pub page: Page<Post>,
    /// Whether the viewer follows `author`; always false for anonymous viewers
    pub following: bool,
    pub posts_count: usize,
    pub following_count: i64,
    pub followers_count: i64,
}

#[derive(Clone)]
pub struct FeedService {
    store: Store,
    paginator: Paginator,
}

impl FeedService {
    pub fn new(store: Store, page_size: usize) -> Self {
        Self {
            store,
            paginator: Paginator::new(page_size),
        }
    }

    async fn page_of(&self, filter: PostFilter, request: PageRequest) -> Result<Page<Post>> {
        let count = self.store.posts.count(&filter).await?.max(0) as usize;
        let number = self.paginator.resolve(request, count);
        let (limit, offset) = self.paginator.window(number);
        let posts = self.store.posts.list(&filter, Some(limit), offset).await?;

        debug!(?filter, count, number, returned = posts.len(), "Composed feed page");
        Ok(self.paginator.page(posts, number, count))
    }

    /// Every post.
    pub async fn global(&self, request: PageRequest) -> Result<Page<Post>> {
        FEED_REQUEST_TOTAL.with_label_values(&["global"]).inc();
        self.page_of(PostFilter::all(), request).await
    }

    /// Posts filed under the group with `slug`.
    pub async fn group(&self, slug: &str, request: PageRequest) -> Result<GroupFeed> {
        FEED_REQUEST_TOTAL.with_label_values(&["group"]).inc();
        let group = self
            .store
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("group '{}'", slug)))?;

        let page = self.page_of(PostFilter::by_group(group.id), request).await?;
        Ok(GroupFeed { group, page })
    }

    /// Posts written by `username`, with the viewer's relationship to them.
    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<i64>,
        request: PageRequest,
    ) -> Result<ProfileFeed> {
        FEED_REQUEST_TOTAL.with_label_values(&["profile"]).inc();
        let author = self
            .store
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{}'", username)))?;

        let page = self.page_of(PostFilter::by_author(author.id), request).await?;
        let following = match viewer {
            Some(viewer_id) => self.store.follows.exists(viewer_id, author.id).await?,
            None => false,
        };
        let following_count = self.store.follows.following_count(author.id).await?;
        let followers_count = self.store.follows.follower_count(author.id).await?;

        Ok(ProfileFeed {
            posts_count: page.count,
            author,
            page,
            following,
            following_count,
            followers_count,
        })
    }

    /// Posts by everyone the actor follows.
    pub async fn follow(&self, actor: Option<i64>, request: PageRequest) -> Result<Page<Post>> {
        FEED_REQUEST_TOTAL.with_label_values(&["follow"]).inc();
        let user_id = actor.ok_or(AppError::Unauthenticated)?;
        self.page_of(PostFilter::followed_by(user_id), request).await
    }
}
