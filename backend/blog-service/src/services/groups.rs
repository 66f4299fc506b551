/// Group service - communities posts may be filed under
///
/// Groups are read-only to the public surfaces; creation and deletion are
/// administrative operations.
use crate::db::Store;
use crate::error::{AppError, FieldErrors, Result};
use crate::models::{Group, NewGroup};
use crate::services::pagination::{Page, PageRequest, Paginator};
use tracing::info;
use validator::Validate;

#[derive(Debug, Clone, Validate)]
struct GroupForm {
    #[validate(length(min = 1, max = 50, message = "Enter a slug of at most 50 characters."))]
    slug: String,
    #[validate(length(min = 1, max = 200, message = "Enter a title of at most 200 characters."))]
    title: String,
}

fn is_slug(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Clone)]
pub struct GroupService {
    store: Store,
    paginator: Paginator,
}

impl GroupService {
    pub fn new(store: Store, page_size: usize) -> Self {
        Self {
            store,
            paginator: Paginator::new(page_size),
        }
    }

    /// One page of the groups index.
    pub async fn list_page(&self, request: PageRequest) -> Result<Page<Group>> {
        let count = self.store.groups.count().await?.max(0) as usize;
        let number = self.paginator.resolve(request, count);
        let (limit, offset) = self.paginator.window(number);
        let groups = self.store.groups.list(Some(limit), offset).await?;
        Ok(self.paginator.page(groups, number, count))
    }

    pub async fn list_all(&self) -> Result<Vec<Group>> {
        self.store.groups.list(None, 0).await
    }

    pub async fn get(&self, id: i64) -> Result<Group> {
        self.store
            .groups
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("group {}", id)))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Group> {
        self.store
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("group '{}'", slug)))
    }

    pub async fn create(&self, group: NewGroup) -> Result<Group> {
        let form = GroupForm {
            slug: group.slug.trim().to_string(),
            title: group.title.trim().to_string(),
        };

        let mut errors = FieldErrors::new();
        if let Err(e) = form.validate() {
            errors.extend(e.into());
        }
        if !form.slug.is_empty() && !is_slug(&form.slug) {
            errors.add(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            );
        }
        errors.into_result()?;

        let created = self
            .store
            .groups
            .create(NewGroup {
                slug: form.slug,
                title: form.title,
                description: group.description,
            })
            .await?;
        info!(group_id = created.id, slug = %created.slug, "Group created");
        Ok(created)
    }

    /// Remove a group; its posts stay, without a group.
    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.store.groups.delete(id).await? {
            return Err(AppError::NotFound(format!("group {}", id)));
        }
        info!(group_id = id, "Group deleted");
        Ok(())
    }
}
