/// Post service - creation, editing and deletion of posts
///
/// Every mutation takes the acting user explicitly. Edits and deletes by anyone
/// other than the author are not applied; the caller receives
/// `Mutation::NotOwner` and decides whether that is an error on its surface.
use crate::db::{PostFilter, Store};
use crate::error::{AppError, FieldErrors, Result};
use crate::media::{ImageUpload, MediaStorage};
use crate::metrics::{CONTENT_MUTATION_TOTAL, OWNERSHIP_DENIED_TOTAL};
use crate::middleware::{can_modify, check_post_ownership};
use crate::models::{NewPost, Post, PostChanges};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// What to do with a post's image on write.
#[derive(Debug, Clone, Default)]
pub enum ImageChange {
    #[default]
    Keep,
    Replace(ImageUpload),
    Clear,
}

/// Submitted post fields. `group_id: None` means no group.
#[derive(Debug, Clone, Validate)]
pub struct PostInput {
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
    pub group_id: Option<i64>,
    pub image: ImageChange,
}

impl PostInput {
    pub fn new(text: impl Into<String>, group_id: Option<i64>) -> Self {
        Self {
            text: text.into(),
            group_id,
            image: ImageChange::Keep,
        }
    }

    pub fn with_image(mut self, image: ImageChange) -> Self {
        self.image = image;
        self
    }
}

/// Result of an owner-gated mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T> {
    Applied(T),
    /// The actor is not the author; the post is returned unchanged.
    NotOwner(Post),
}

impl<T> Mutation<T> {
    /// Strict form: a refused mutation becomes `PermissionDenied`.
    pub fn into_result(self) -> Result<T> {
        match self {
            Mutation::Applied(value) => Ok(value),
            Mutation::NotOwner(_) => Err(AppError::PermissionDenied(
                "You do not have permission to modify another user's post.".to_string(),
            )),
        }
    }
}

#[derive(Clone)]
pub struct PostService {
    store: Store,
    media: Arc<dyn MediaStorage>,
    max_upload_bytes: usize,
}

impl PostService {
    pub fn new(store: Store, media: Arc<dyn MediaStorage>, max_upload_bytes: usize) -> Self {
        Self {
            store,
            media,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Get a post by ID
    pub async fn get(&self, post_id: i64) -> Result<Post> {
        self.store
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))
    }

    /// Get a post addressed as `/<username>/<post_id>/`; both parts must agree.
    pub async fn get_by_author(&self, username: &str, post_id: i64) -> Result<Post> {
        match self.store.posts.find_by_id(post_id).await? {
            Some(post) if post.author == username => Ok(post),
            _ => Err(AppError::NotFound(format!(
                "post {} by '{}'",
                post_id, username
            ))),
        }
    }

    /// All posts, optionally narrowed to an author username and/or group slug.
    ///
    /// An unknown author or group narrows to nothing rather than erroring.
    pub async fn list(&self, author: Option<&str>, group: Option<&str>) -> Result<Vec<Post>> {
        let mut filter = PostFilter::all();

        if let Some(username) = author {
            match self.store.users.find_by_username(username).await? {
                Some(user) => filter.author_id = Some(user.id),
                None => return Ok(Vec::new()),
            }
        }
        if let Some(slug) = group {
            match self.store.groups.find_by_slug(slug).await? {
                Some(group) => filter.group_id = Some(group.id),
                None => return Ok(Vec::new()),
            }
        }

        self.store.posts.list(&filter, None, 0).await
    }

    /// Normalize and check a submission. Returns the image extension when a
    /// new image is attached.
    async fn clean(&self, input: &mut PostInput) -> Result<Option<&'static str>> {
        input.text = input.text.trim().to_string();

        let mut errors = FieldErrors::new();
        if let Err(e) = input.validate() {
            errors.extend(e.into());
        }

        if let Some(group_id) = input.group_id {
            if self.store.groups.find_by_id(group_id).await?.is_none() {
                errors.add(
                    "group",
                    "Select a valid choice. That choice is not one of the available choices.",
                );
            }
        }

        let extension = match &input.image {
            ImageChange::Replace(upload) => match upload.validate(self.max_upload_bytes) {
                Ok(ext) => Some(ext),
                Err(AppError::Validation(image_errors)) => {
                    errors.extend(image_errors);
                    None
                }
                Err(e) => return Err(e),
            },
            ImageChange::Keep | ImageChange::Clear => None,
        };

        errors.into_result()?;
        Ok(extension)
    }

    async fn store_image(
        &self,
        image: &ImageChange,
        extension: Option<&'static str>,
    ) -> Result<Option<String>> {
        match (image, extension) {
            (ImageChange::Replace(upload), Some(ext)) => {
                Ok(Some(self.media.save(&upload.bytes, ext).await?))
            }
            _ => Ok(None),
        }
    }

    /// Best effort: a blob that cannot be removed is logged and left behind.
    async fn discard_image(&self, path: &str) {
        if let Err(e) = self.media.delete(path).await {
            warn!(%path, error = %e, "Failed to remove image blob");
        }
    }

    fn refused(&self, user_id: i64, post: &Post, action: &str) {
        OWNERSHIP_DENIED_TOTAL
            .with_label_values(&["post", action])
            .inc();
        warn!(post_id = post.id, user_id, action, "Post mutation refused: not the author");
    }

    fn owns(&self, user_id: i64, post: &Post, action: &str) -> bool {
        let owner = can_modify(Some(user_id), post);
        if !owner {
            self.refused(user_id, post, action);
        }
        owner
    }

    /// Fail with `PermissionDenied` unless `user_id` wrote `post`.
    pub fn authorize(&self, user_id: i64, post: &Post, action: &str) -> Result<()> {
        check_post_ownership(user_id, post).map_err(|e| {
            self.refused(user_id, post, action);
            e
        })
    }

    /// Create a post authored by `actor`.
    pub async fn create(&self, actor: Option<i64>, mut input: PostInput) -> Result<Post> {
        let author_id = actor.ok_or(AppError::Unauthenticated)?;
        let extension = self.clean(&mut input).await?;
        let image = self.store_image(&input.image, extension).await?;

        let created = self
            .store
            .posts
            .create(NewPost {
                author_id,
                text: input.text,
                group_id: input.group_id,
                image: image.clone(),
            })
            .await;

        match created {
            Ok(post) => {
                CONTENT_MUTATION_TOTAL
                    .with_label_values(&["post", "create"])
                    .inc();
                info!(post_id = post.id, author_id, "Post created");
                Ok(post)
            }
            Err(e) => {
                if let Some(path) = image {
                    self.discard_image(&path).await;
                }
                Err(e)
            }
        }
    }

    /// Replace the text, group and image of `post` if `actor` wrote it.
    pub async fn edit(
        &self,
        actor: Option<i64>,
        post: Post,
        mut input: PostInput,
    ) -> Result<Mutation<Post>> {
        let user_id = actor.ok_or(AppError::Unauthenticated)?;
        if !self.owns(user_id, &post, "edit") {
            return Ok(Mutation::NotOwner(post));
        }

        let extension = self.clean(&mut input).await?;
        let image = match &input.image {
            ImageChange::Keep => post.image.clone(),
            ImageChange::Clear => None,
            ImageChange::Replace(_) => self.store_image(&input.image, extension).await?,
        };

        let changes = PostChanges {
            text: input.text,
            group_id: input.group_id,
            image: image.clone(),
        };
        let updated = match self.store.posts.update(post.id, changes).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                if let (ImageChange::Replace(_), Some(path)) = (&input.image, &image) {
                    self.discard_image(path).await;
                }
                return Err(AppError::NotFound(format!("post {}", post.id)));
            }
            Err(e) => {
                if let (ImageChange::Replace(_), Some(path)) = (&input.image, &image) {
                    self.discard_image(path).await;
                }
                return Err(e);
            }
        };

        if let Some(old) = post.image.as_deref() {
            if updated.image.as_deref() != Some(old) {
                self.discard_image(old).await;
            }
        }

        CONTENT_MUTATION_TOTAL
            .with_label_values(&["post", "edit"])
            .inc();
        info!(post_id = post.id, user_id, "Post edited");
        Ok(Mutation::Applied(updated))
    }

    /// Delete `post` and its comments if `actor` wrote it.
    pub async fn delete(&self, actor: Option<i64>, post: Post) -> Result<Mutation<()>> {
        let user_id = actor.ok_or(AppError::Unauthenticated)?;
        if !self.owns(user_id, &post, "delete") {
            return Ok(Mutation::NotOwner(post));
        }

        if !self.store.posts.delete(post.id).await? {
            return Err(AppError::NotFound(format!("post {}", post.id)));
        }
        if let Some(path) = post.image.as_deref() {
            self.discard_image(path).await;
        }

        CONTENT_MUTATION_TOTAL
            .with_label_values(&["post", "delete"])
            .inc();
        info!(post_id = post.id, user_id, "Post deleted");
        Ok(Mutation::Applied(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::tests::SMALL_GIF;
    use crate::media::LocalMediaStorage;
    use crate::models::{NewComment, NewGroup, NewUser, User};

    struct Fixture {
        store: Store,
        service: PostService,
        dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let store = Store::in_memory();
        let dir = tempfile::tempdir().unwrap();
        let media = Arc::new(LocalMediaStorage::new(dir.path()));
        let service = PostService::new(store.clone(), media, 1024 * 1024);
        Fixture {
            store,
            service,
            dir,
        }
    }

    async fn user(store: &Store, username: &str) -> User {
        store
            .users
            .create(NewUser {
                username: username.to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    fn gif() -> ImageChange {
        ImageChange::Replace(ImageUpload::new(
            Some("small.gif".into()),
            SMALL_GIF.to_vec(),
        ))
    }

    #[tokio::test]
    async fn create_requires_an_actor() {
        let f = fixture();
        let result = f.service.create(None, PostInput::new("hello", None)).await;
        assert!(matches!(result, Err(AppError::Unauthenticated)));
    }

    #[tokio::test]
    async fn blank_text_is_a_field_error() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;

        let result = f
            .service
            .create(Some(alice.id), PostInput::new("   ", None))
            .await;
        match result {
            Err(AppError::Validation(errors)) => assert!(errors.get("text").is_some()),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_group_and_bad_image_are_reported_together() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;

        let input = PostInput::new("hello", Some(999)).with_image(ImageChange::Replace(
            ImageUpload::new(None, b"plain text".to_vec()),
        ));
        match f.service.create(Some(alice.id), input).await {
            Err(AppError::Validation(errors)) => {
                assert!(errors.get("group").is_some());
                assert!(errors.get("image").is_some());
                assert!(errors.get("text").is_none());
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn author_is_stamped_from_the_actor() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let post = f
            .service
            .create(Some(alice.id), PostInput::new("  hello  ", None))
            .await
            .unwrap();

        assert_eq!(post.author_id, alice.id);
        assert_eq!(post.author, "alice");
        assert_eq!(post.text, "hello");
    }

    #[tokio::test]
    async fn non_owner_edit_and_delete_leave_post_unchanged() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let mallory = user(&f.store, "mallory").await;
        let post = f
            .service
            .create(Some(alice.id), PostInput::new("original", None))
            .await
            .unwrap();

        let edit = f
            .service
            .edit(Some(mallory.id), post.clone(), PostInput::new("defaced", None))
            .await
            .unwrap();
        assert_eq!(edit, Mutation::NotOwner(post.clone()));
        assert!(matches!(
            edit.into_result(),
            Err(AppError::PermissionDenied(_))
        ));

        let delete = f.service.delete(Some(mallory.id), post.clone()).await.unwrap();
        assert!(matches!(delete, Mutation::NotOwner(_)));

        assert_eq!(f.service.get(post.id).await.unwrap(), post);
    }

    #[tokio::test]
    async fn edit_without_group_clears_it() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let group = f
            .store
            .groups
            .create(NewGroup {
                slug: "rust".into(),
                title: "Rust".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let post = f
            .service
            .create(Some(alice.id), PostInput::new("hello", Some(group.id)))
            .await
            .unwrap();
        assert_eq!(post.group_id, Some(group.id));

        let edited = f
            .service
            .edit(Some(alice.id), post, PostInput::new("hello again", None))
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(edited.group_id, None);
        assert_eq!(edited.text, "hello again");
    }

    #[tokio::test]
    async fn replacing_an_image_removes_the_old_blob() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let post = f
            .service
            .create(Some(alice.id), PostInput::new("pic", None).with_image(gif()))
            .await
            .unwrap();
        let first = post.image.clone().unwrap();
        assert!(f.dir.path().join(&first).exists());

        let edited = f
            .service
            .edit(
                Some(alice.id),
                post,
                PostInput::new("pic", None).with_image(gif()),
            )
            .await
            .unwrap()
            .into_result()
            .unwrap();
        let second = edited.image.clone().unwrap();
        assert_ne!(first, second);
        assert!(!f.dir.path().join(&first).exists());
        assert!(f.dir.path().join(&second).exists());

        let kept = f
            .service
            .edit(Some(alice.id), edited, PostInput::new("pic", None))
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(kept.image.as_deref(), Some(second.as_str()));
    }

    #[tokio::test]
    async fn delete_cascades_to_comments() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let bob = user(&f.store, "bob").await;
        let post = f
            .service
            .create(Some(alice.id), PostInput::new("hello", None))
            .await
            .unwrap();
        let comment = f
            .store
            .comments
            .create(NewComment {
                post_id: post.id,
                author_id: bob.id,
                text: "nice".into(),
            })
            .await
            .unwrap();

        let outcome = f.service.delete(Some(alice.id), post.clone()).await.unwrap();
        assert_eq!(outcome, Mutation::Applied(()));
        assert!(matches!(
            f.service.get(post.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(f
            .store
            .comments
            .find_by_id(comment.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn author_and_post_id_must_agree() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        user(&f.store, "bob").await;
        let post = f
            .service
            .create(Some(alice.id), PostInput::new("hello", None))
            .await
            .unwrap();

        assert!(f.service.get_by_author("alice", post.id).await.is_ok());
        assert!(matches!(
            f.service.get_by_author("bob", post.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_filters_by_author_and_group() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let bob = user(&f.store, "bob").await;
        let group = f
            .store
            .groups
            .create(NewGroup {
                slug: "test-slug".into(),
                title: "Test".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        f.service
            .create(Some(alice.id), PostInput::new("a1", Some(group.id)))
            .await
            .unwrap();
        f.service
            .create(Some(bob.id), PostInput::new("b1", None))
            .await
            .unwrap();

        assert_eq!(f.service.list(None, None).await.unwrap().len(), 2);
        let by_alice = f.service.list(Some("alice"), None).await.unwrap();
        assert_eq!(by_alice.len(), 1);
        assert_eq!(by_alice[0].text, "a1");
        assert_eq!(
            f.service.list(None, Some("test-slug")).await.unwrap().len(),
            1
        );
        assert!(f.service.list(Some("nobody"), None).await.unwrap().is_empty());
        assert!(f
            .service
            .list(Some("bob"), Some("test-slug"))
            .await
            .unwrap()
            .is_empty());
    }
}
