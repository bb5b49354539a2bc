use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use super::{listing_order, normalize_prefix, template_order, TaskStore, TemplateStore};
use crate::error::CoreError;
use crate::models::{SavedTemplate, Task, TaskId};

/// In-process store. Multi-record writes run under a single write lock and
/// validate before mutating, which makes them atomic for every reader.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: RwLock<BTreeMap<TaskId, Task>>,
    templates: RwLock<BTreeMap<String, SavedTemplate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert(&self, task: Task) -> Result<(), CoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(CoreError::Store(format!("Task {} already exists", task.id)));
        }
        tasks.insert(task.id, task);
        Ok(())
    }

    async fn update(&self, task: Task) -> Result<(), CoreError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task;
                Ok(())
            }
            None => Err(CoreError::NotFound(task.id.to_string())),
        }
    }

    async fn remove(&self, id: TaskId) -> Result<bool, CoreError> {
        Ok(self.tasks.write().await.remove(&id).is_some())
    }

    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, CoreError> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn find_by_id_prefix(&self, prefix: &str) -> Result<Vec<Task>, CoreError> {
        let prefix = normalize_prefix(prefix);
        let tasks = self.tasks.read().await;
        let mut found: Vec<Task> = tasks
            .values()
            .filter(|t| t.id.as_uuid().simple().to_string().starts_with(&prefix))
            .cloned()
            .collect();
        found.sort_by(listing_order);
        Ok(found)
    }

    async fn find_by_parent_id(&self, parent_id: TaskId) -> Result<Vec<Task>, CoreError> {
        let tasks = self.tasks.read().await;
        let mut found: Vec<Task> = tasks
            .values()
            .filter(|t| t.parent_task_id == Some(parent_id))
            .cloned()
            .collect();
        found.sort_by(listing_order);
        Ok(found)
    }

    async fn find_all(&self) -> Result<Vec<Task>, CoreError> {
        let mut all: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        all.sort_by(listing_order);
        Ok(all)
    }

    async fn replace_instances(&self, parent: &Task, instances: Vec<Task>) -> Result<usize, CoreError> {
        let mut tasks = self.tasks.write().await;

        let outgoing: HashSet<TaskId> = tasks
            .values()
            .filter(|t| t.parent_task_id == Some(parent.id))
            .map(|t| t.id)
            .collect();

        let mut incoming: HashSet<TaskId> = HashSet::with_capacity(instances.len());
        for instance in &instances {
            if instance.parent_task_id != Some(parent.id) {
                return Err(CoreError::Store(format!(
                    "Instance {} does not belong to parent {}",
                    instance.id, parent.id
                )));
            }
            let taken = instance.id == parent.id
                || (tasks.contains_key(&instance.id) && !outgoing.contains(&instance.id));
            if taken || !incoming.insert(instance.id) {
                return Err(CoreError::Store(format!("Task {} already exists", instance.id)));
            }
        }

        // Checks passed; nothing below can fail.
        for id in &outgoing {
            tasks.remove(id);
        }
        tasks.insert(parent.id, parent.clone());
        for instance in instances {
            tasks.insert(instance.id, instance);
        }

        Ok(outgoing.len())
    }

    async fn remove_with_instances(&self, parent_id: TaskId) -> Result<usize, CoreError> {
        let mut tasks = self.tasks.write().await;
        if !tasks.contains_key(&parent_id) {
            return Err(CoreError::NotFound(parent_id.to_string()));
        }
        let before = tasks.len();
        tasks.retain(|_, t| t.parent_task_id != Some(parent_id));
        let removed = before - tasks.len();
        tasks.remove(&parent_id);
        Ok(removed)
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn insert_template(&self, template: SavedTemplate) -> Result<(), CoreError> {
        let mut templates = self.templates.write().await;
        if templates.contains_key(&template.name) {
            return Err(CoreError::Store(format!("Template '{}' already exists", template.name)));
        }
        templates.insert(template.name.clone(), template);
        Ok(())
    }

    async fn update_template(&self, template: SavedTemplate) -> Result<(), CoreError> {
        let mut templates = self.templates.write().await;
        match templates.get_mut(&template.name) {
            Some(existing) => {
                *existing = template;
                Ok(())
            }
            None => Err(CoreError::NotFound(template.name)),
        }
    }

    async fn remove_template(&self, name: &str) -> Result<bool, CoreError> {
        Ok(self.templates.write().await.remove(name).is_some())
    }

    async fn find_template(&self, name: &str) -> Result<Option<SavedTemplate>, CoreError> {
        Ok(self.templates.read().await.get(name).cloned())
    }

    async fn find_all_templates(&self) -> Result<Vec<SavedTemplate>, CoreError> {
        let mut all: Vec<SavedTemplate> = self.templates.read().await.values().cloned().collect();
        all.sort_by(template_order);
        Ok(all)
    }
}
