use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::{SavedTemplate, Task, TaskId};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Storage capability consumed by the recurrence lifecycle.
///
/// `replace_instances` and `remove_with_instances` are the only operations
/// that touch several records; implementations must apply each as one
/// atomic unit so readers observe either the old or the new instance set.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, task: Task) -> Result<(), CoreError>;

    /// Overwrites an existing record. Fails with `NotFound` if absent.
    async fn update(&self, task: Task) -> Result<(), CoreError>;

    /// Removes one record. Returns whether it existed.
    async fn remove(&self, id: TaskId) -> Result<bool, CoreError>;

    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, CoreError>;

    /// Tasks whose id starts with the given hex prefix (hyphens ignored).
    async fn find_by_id_prefix(&self, prefix: &str) -> Result<Vec<Task>, CoreError>;

    /// Instances of a parent, ordered by due date.
    async fn find_by_parent_id(&self, parent_id: TaskId) -> Result<Vec<Task>, CoreError>;

    /// Every task, ordered by due date (undated last) then creation time.
    async fn find_all(&self) -> Result<Vec<Task>, CoreError>;

    /// Upserts `parent` and swaps its whole instance set for `instances`.
    /// Returns how many previous instances were removed. On error nothing
    /// is changed.
    async fn replace_instances(&self, parent: &Task, instances: Vec<Task>) -> Result<usize, CoreError>;

    /// Removes a parent together with all of its instances. Returns the
    /// number of instances removed.
    async fn remove_with_instances(&self, parent_id: TaskId) -> Result<usize, CoreError>;
}

/// Storage for saved task templates, keyed by name.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Fails if a template with the same name exists.
    async fn insert_template(&self, template: SavedTemplate) -> Result<(), CoreError>;

    /// Overwrites an existing template. Fails with `NotFound` if absent.
    async fn update_template(&self, template: SavedTemplate) -> Result<(), CoreError>;

    /// Returns whether the template existed.
    async fn remove_template(&self, name: &str) -> Result<bool, CoreError>;

    async fn find_template(&self, name: &str) -> Result<Option<SavedTemplate>, CoreError>;

    /// Every template, most used first, then by name.
    async fn find_all_templates(&self) -> Result<Vec<SavedTemplate>, CoreError>;
}

/// Canonical sort used by every store for listings.
pub(crate) fn listing_order(a: &Task, b: &Task) -> std::cmp::Ordering {
    match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
    .then_with(|| a.created_at.cmp(&b.created_at))
    .then_with(|| a.id.cmp(&b.id))
}

/// Lower-case hex digits of a short id, hyphens removed.
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    prefix.chars().filter(|c| *c != '-').flat_map(char::to_lowercase).collect()
}

pub(crate) fn template_order(a: &SavedTemplate, b: &SavedTemplate) -> std::cmp::Ordering {
    b.usage_count.cmp(&a.usage_count).then_with(|| a.name.cmp(&b.name))
}
