//! In-memory store
//!
//! Mirrors the PostgreSQL schema's constraints (unique usernames, slugs and
//! follow pairs, no self-follow, foreign keys) so that the service layer sees
//! identical behavior in development and tests. Timestamps are strictly
//! increasing per store so insertion order and time order always agree.

use super::{
    CommentRepository, FollowRepository, GroupRepository, PostFilter, PostRepository,
    UserRepository,
};
use crate::error::{AppError, Result};
use crate::models::{
    Comment, Follow, Group, NewComment, NewGroup, NewPost, NewUser, Post, PostChanges, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct PostRow {
    text: String,
    pub_date: DateTime<Utc>,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
}

#[derive(Debug, Clone)]
struct CommentRow {
    post_id: i64,
    author_id: i64,
    text: String,
    created: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct FollowRow {
    user_id: i64,
    author_id: i64,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    groups: BTreeMap<i64, Group>,
    posts: BTreeMap<i64, PostRow>,
    comments: BTreeMap<i64, CommentRow>,
    follows: BTreeMap<i64, FollowRow>,
    last_id: i64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn username(&self, user_id: i64) -> String {
        self.users
            .get(&user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn post(&self, id: i64, row: &PostRow) -> Post {
        Post {
            id,
            text: row.text.clone(),
            pub_date: row.pub_date,
            author_id: row.author_id,
            author: self.username(row.author_id),
            group_id: row.group_id,
            image: row.image.clone(),
        }
    }

    fn comment(&self, id: i64, row: &CommentRow) -> Comment {
        Comment {
            id,
            post_id: row.post_id,
            author_id: row.author_id,
            author: self.username(row.author_id),
            text: row.text.clone(),
            created: row.created,
        }
    }

    fn follow(&self, id: i64, row: &FollowRow) -> Follow {
        Follow {
            id,
            user_id: row.user_id,
            user: self.username(row.user_id),
            author_id: row.author_id,
            author: self.username(row.author_id),
        }
    }

    fn is_following(&self, user_id: i64, author_id: i64) -> bool {
        self.follows
            .values()
            .any(|f| f.user_id == user_id && f.author_id == author_id)
    }

    fn matches(&self, filter: &PostFilter, row: &PostRow) -> bool {
        filter.author_id.map_or(true, |id| row.author_id == id)
            && filter.group_id.map_or(true, |id| row.group_id == Some(id))
            && filter
                .followed_by
                .map_or(true, |user_id| self.is_following(user_id, row.author_id))
    }

    /// Newest first, ties broken by ascending id.
    fn sorted_posts<'a>(&'a self, keep: impl Fn(&PostRow) -> bool) -> Vec<(i64, &'a PostRow)> {
        let mut rows: Vec<(i64, &PostRow)> = self
            .posts
            .iter()
            .filter(|(_, row)| keep(row))
            .map(|(id, row)| (*id, row))
            .collect();
        rows.sort_by(|(a_id, a), (b_id, b)| b.pub_date.cmp(&a.pub_date).then(a_id.cmp(b_id)));
        rows
    }

    fn check_post_refs(&self, author_id: i64, group_id: Option<i64>) -> Result<()> {
        if !self.users.contains_key(&author_id) {
            return Err(AppError::invalid("author", "Unknown user."));
        }
        if let Some(group_id) = group_id {
            if !self.groups.contains_key(&group_id) {
                return Err(AppError::invalid(
                    "group",
                    "Select a valid choice. That choice is not one of the available choices.",
                ));
            }
        }
        Ok(())
    }

    fn remove_post(&mut self, id: i64) -> bool {
        self.comments.retain(|_, c| c.post_id != id);
        self.posts.remove(&id).is_some()
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Shared in-memory tables; clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(AppError::invalid(
                "username",
                "A user with that username already exists.",
            ));
        }
        let id = tables.next_id();
        let date_joined = tables.now();
        let created = User {
            id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            date_joined,
        };
        tables.users.insert(id, created.clone());
        Ok(created)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let own_posts: Vec<i64> = tables
            .posts
            .iter()
            .filter(|(_, p)| p.author_id == id)
            .map(|(post_id, _)| *post_id)
            .collect();
        for post_id in own_posts {
            tables.remove_post(post_id);
        }
        tables.comments.retain(|_, c| c.author_id != id);
        tables
            .follows
            .retain(|_, f| f.user_id != id && f.author_id != id);
        Ok(tables.users.remove(&id).is_some())
    }

    async fn search(&self, query: &str) -> Result<Vec<User>> {
        let needle = query.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| {
                contains_ci(&u.username, &needle)
                    || contains_ci(&u.first_name, &needle)
                    || contains_ci(&u.last_name, &needle)
            })
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.tables.read().await.users.len() as i64)
    }
}

#[async_trait]
impl GroupRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Group>> {
        Ok(self.tables.read().await.groups.get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let tables = self.tables.read().await;
        Ok(tables.groups.values().find(|g| g.slug == slug).cloned())
    }

    async fn list(&self, limit: Option<i64>, offset: i64) -> Result<Vec<Group>> {
        let tables = self.tables.read().await;
        let iter = tables.groups.values().skip(offset.max(0) as usize);
        Ok(match limit {
            Some(limit) => iter.take(limit.max(0) as usize).cloned().collect(),
            None => iter.cloned().collect(),
        })
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.tables.read().await.groups.len() as i64)
    }

    async fn create(&self, group: NewGroup) -> Result<Group> {
        let mut tables = self.tables.write().await;
        if tables.groups.values().any(|g| g.slug == group.slug) {
            return Err(AppError::invalid(
                "slug",
                "A group with this slug already exists.",
            ));
        }
        let id = tables.next_id();
        let created = Group {
            id,
            slug: group.slug,
            title: group.title,
            description: group.description,
        };
        tables.groups.insert(id, created.clone());
        Ok(created)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        for post in tables.posts.values_mut() {
            if post.group_id == Some(id) {
                post.group_id = None;
            }
        }
        Ok(tables.groups.remove(&id).is_some())
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.posts.get(&id).map(|row| tables.post(id, row)))
    }

    async fn list(
        &self,
        filter: &PostFilter,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;
        let rows = tables.sorted_posts(|row| tables.matches(filter, row));
        let iter = rows.into_iter().skip(offset.max(0) as usize);
        let window: Vec<(i64, &PostRow)> = match limit {
            Some(limit) => iter.take(limit.max(0) as usize).collect(),
            None => iter.collect(),
        };
        Ok(window
            .into_iter()
            .map(|(id, row)| tables.post(id, row))
            .collect())
    }

    async fn count(&self, filter: &PostFilter) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .values()
            .filter(|row| tables.matches(filter, row))
            .count() as i64)
    }

    async fn create(&self, post: NewPost) -> Result<Post> {
        let mut tables = self.tables.write().await;
        tables.check_post_refs(post.author_id, post.group_id)?;
        let id = tables.next_id();
        let row = PostRow {
            text: post.text,
            pub_date: tables.now(),
            author_id: post.author_id,
            group_id: post.group_id,
            image: post.image,
        };
        let created = tables.post(id, &row);
        tables.posts.insert(id, row);
        Ok(created)
    }

    async fn update(&self, id: i64, changes: PostChanges) -> Result<Option<Post>> {
        let mut tables = self.tables.write().await;
        let author_id = match tables.posts.get(&id) {
            Some(row) => row.author_id,
            None => return Ok(None),
        };
        tables.check_post_refs(author_id, changes.group_id)?;
        let updated = match tables.posts.get_mut(&id) {
            Some(row) => {
                row.text = changes.text;
                row.group_id = changes.group_id;
                row.image = changes.image;
                row.clone()
            }
            None => return Ok(None),
        };
        Ok(Some(tables.post(id, &updated)))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.remove_post(id))
    }

    async fn search(&self, query: &str) -> Result<Vec<Post>> {
        let needle = query.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .sorted_posts(|row| contains_ci(&row.text, &needle))
            .into_iter()
            .map(|(id, row)| tables.post(id, row))
            .collect())
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables.comments.get(&id).map(|row| tables.comment(id, row)))
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|(_, row)| row.post_id == post_id)
            .map(|(id, row)| tables.comment(*id, row))
            .collect();
        comments.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn create(&self, comment: NewComment) -> Result<Comment> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(AppError::NotFound(format!("post {}", comment.post_id)));
        }
        if !tables.users.contains_key(&comment.author_id) {
            return Err(AppError::invalid("author", "Unknown user."));
        }
        let id = tables.next_id();
        let row = CommentRow {
            post_id: comment.post_id,
            author_id: comment.author_id,
            text: comment.text,
            created: tables.now(),
        };
        let created = tables.comment(id, &row);
        tables.comments.insert(id, row);
        Ok(created)
    }

    async fn update(&self, id: i64, text: &str) -> Result<Option<Comment>> {
        let mut tables = self.tables.write().await;
        let updated = match tables.comments.get_mut(&id) {
            Some(row) => {
                row.text = text.to_string();
                row.clone()
            }
            None => return Ok(None),
        };
        Ok(Some(tables.comment(id, &updated)))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.comments.remove(&id).is_some())
    }
}

#[async_trait]
impl FollowRepository for MemoryStore {
    async fn create(&self, user_id: i64, author_id: i64) -> Result<bool> {
        if user_id == author_id {
            return Err(AppError::invalid("author", "You cannot follow yourself."));
        }
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) || !tables.users.contains_key(&author_id) {
            return Err(AppError::invalid("author", "Unknown user."));
        }
        if tables.is_following(user_id, author_id) {
            return Ok(false);
        }
        let id = tables.next_id();
        tables.follows.insert(id, FollowRow { user_id, author_id });
        Ok(true)
    }

    async fn delete(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.follows.len();
        tables
            .follows
            .retain(|_, f| !(f.user_id == user_id && f.author_id == author_id));
        Ok(tables.follows.len() < before)
    }

    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool> {
        Ok(self.tables.read().await.is_following(user_id, author_id))
    }

    async fn list_for_user(&self, user_id: i64, search: Option<&str>) -> Result<Vec<Follow>> {
        let needle = search.map(str::to_lowercase);
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .filter(|(_, f)| f.user_id == user_id)
            .map(|(id, f)| tables.follow(*id, f))
            .filter(|f| {
                needle
                    .as_deref()
                    .map_or(true, |needle| contains_ci(&f.author, needle))
            })
            .collect())
    }

    async fn following_count(&self, user_id: i64) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables.follows.values().filter(|f| f.user_id == user_id).count() as i64)
    }

    async fn follower_count(&self, user_id: i64) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .values()
            .filter(|f| f.author_id == user_id)
            .count() as i64)
    }
}
