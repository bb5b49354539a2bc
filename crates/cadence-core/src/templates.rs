//! Saved task templates.
//!
//! A template keeps the fields of a task, optionally a recurrence rule and
//! a due date relative to the day it is used. Using a template goes
//! through [`RecurrenceLifecycleManager::create_task`], so a recurring
//! template yields a parent and its instances in one atomic write.

use tracing::{info, instrument};

use crate::error::CoreError;
use crate::lifecycle::RecurrenceLifecycleManager;
use crate::models::{NewTemplateData, SavedTemplate, TaskChange};
use crate::store::{TaskStore, TemplateStore};

impl<S: TaskStore + TemplateStore> RecurrenceLifecycleManager<S> {
    /// Saves a new template under a unique name. The rule is checked on its
    /// own here and again against the due date each time it is used.
    #[instrument(skip(self, data), fields(name = %data.name))]
    pub async fn save_template(&self, data: NewTemplateData) -> Result<SavedTemplate, CoreError> {
        let name = required(&data.name, "Template name")?;
        let title = required(&data.title, "Task title")?;
        if let Some(rule) = &data.recurrence {
            rule.validate()?;
        }
        if self.store.find_template(&name).await?.is_some() {
            return Err(CoreError::InvalidInput(format!("Template '{}' already exists", name)));
        }

        let template = SavedTemplate {
            name,
            title,
            description: data.description,
            category: data.category,
            priority: data.priority.unwrap_or_default(),
            relative_due: data.relative_due,
            recurrence: data.recurrence,
            usage_count: 0,
            last_used_at: None,
            created_at: self.clock.now(),
        };
        self.store.insert_template(template.clone()).await?;
        info!(template = %template.name, "template saved");
        Ok(template)
    }

    /// Creates a task from the named template and records the use.
    #[instrument(skip(self))]
    pub async fn create_from_template(&self, name: &str) -> Result<TaskChange, CoreError> {
        let mut template = self.require_template(name).await?;

        let change = self
            .create_task(template.to_new_task(self.clock.today()))
            .await?;

        template.usage_count = template.usage_count.saturating_add(1);
        template.last_used_at = Some(self.clock.now());
        self.store.update_template(template).await?;

        info!(template = name, task = %change.task.id, "task created from template");
        Ok(change)
    }

    pub async fn find_template(&self, name: &str) -> Result<Option<SavedTemplate>, CoreError> {
        self.store.find_template(name.trim()).await
    }

    /// Every saved template, most used first.
    pub async fn list_templates(&self) -> Result<Vec<SavedTemplate>, CoreError> {
        self.store.find_all_templates().await
    }

    #[instrument(skip(self))]
    pub async fn delete_template(&self, name: &str) -> Result<(), CoreError> {
        if !self.store.remove_template(name.trim()).await? {
            return Err(not_found(name));
        }
        info!(template = name, "template deleted");
        Ok(())
    }

    async fn require_template(&self, name: &str) -> Result<SavedTemplate, CoreError> {
        self.store
            .find_template(name.trim())
            .await?
            .ok_or_else(|| not_found(name))
    }
}

fn not_found(name: &str) -> CoreError {
    CoreError::NotFound(format!("No template named '{}'", name.trim()))
}

fn required(value: &str, what: &str) -> Result<String, CoreError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::InvalidInput(format!("{} cannot be empty", what)));
    }
    Ok(value.to_string())
}
