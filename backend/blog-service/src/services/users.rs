/// User service - account records mirrored from the identity provider
///
/// Credentials are not handled here; these are the administrative operations
/// on the user table, including the full cascade on deletion.
use crate::db::{PostFilter, Store};
use crate::error::{AppError, FieldErrors, Result};
use crate::media::MediaStorage;
use crate::models::{NewUser, User};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

#[derive(Debug, Clone, Validate)]
struct UserForm {
    #[validate(length(min = 1, max = 150, message = "Enter a username of at most 150 characters."))]
    username: String,
    #[validate(length(max = 150))]
    first_name: String,
    #[validate(length(max = 150))]
    last_name: String,
}

/// Letters, digits and `@ . + - _` only.
fn is_username(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

#[derive(Clone)]
pub struct UserService {
    store: Store,
    media: Arc<dyn MediaStorage>,
}

impl UserService {
    pub fn new(store: Store, media: Arc<dyn MediaStorage>) -> Self {
        Self { store, media }
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User> {
        self.store
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{}'", username)))
    }

    /// Number of registered users, shown site-wide.
    pub async fn count(&self) -> Result<i64> {
        self.store.users.count().await
    }

    pub async fn create(&self, user: NewUser) -> Result<User> {
        let form = UserForm {
            username: user.username.trim().to_string(),
            first_name: user.first_name.trim().to_string(),
            last_name: user.last_name.trim().to_string(),
        };

        let mut errors = FieldErrors::new();
        if let Err(e) = form.validate() {
            errors.extend(e.into());
        }
        if !form.username.is_empty() && !is_username(&form.username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
        errors.into_result()?;

        let created = self
            .store
            .users
            .create(NewUser {
                username: form.username,
                first_name: form.first_name,
                last_name: form.last_name,
            })
            .await?;
        info!(user_id = created.id, username = %created.username, "User created");
        Ok(created)
    }

    /// Remove a user with their posts, comments and follow edges.
    ///
    /// Image blobs of the removed posts are deleted afterwards, best effort.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let images: Vec<String> = self
            .store
            .posts
            .list(&PostFilter::by_author(id), None, 0)
            .await?
            .into_iter()
            .filter_map(|post| post.image)
            .collect();

        if !self.store.users.delete(id).await? {
            return Err(AppError::NotFound(format!("user {}", id)));
        }

        for path in &images {
            if let Err(e) = self.media.delete(path).await {
                warn!(%path, error = %e, "Failed to remove image blob");
            }
        }
        info!(user_id = id, images = images.len(), "User deleted");
        Ok(())
    }
}
