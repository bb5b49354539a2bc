use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::error::CoreError;
use crate::identity::IdAllocator;
use crate::models::Task;

/// Turns occurrence dates into instance records linked to their parent.
///
/// Identities come from the injected allocator, never from the store's
/// current contents, so repeated or concurrent materializations cannot
/// collide with each other.
#[derive(Clone)]
pub struct TaskInstanceMaterializer {
    ids: Arc<dyn IdAllocator>,
}

impl TaskInstanceMaterializer {
    pub fn new(ids: Arc<dyn IdAllocator>) -> Self {
        Self { ids }
    }

    pub fn materialize(
        &self,
        parent: &Task,
        occurrences: &[NaiveDate],
        created_at: DateTime<Utc>,
    ) -> Result<Vec<Task>, CoreError> {
        materialize_instances(parent, occurrences, self.ids.as_ref(), created_at)
    }
}

/// Builds one instance per occurrence, in ascending date order.
///
/// Dates that are not strictly after the previously materialized one are
/// dropped so the output order always holds.
pub fn materialize_instances(
    parent: &Task,
    occurrences: &[NaiveDate],
    ids: &dyn IdAllocator,
    created_at: DateTime<Utc>,
) -> Result<Vec<Task>, CoreError> {
    if parent.recurring_instance || parent.parent_task_id.is_some() {
        return Err(CoreError::InvalidInput(format!(
            "Task {} is a recurring instance and cannot own instances",
            parent.id
        )));
    }

    let template = parent.template();
    let mut instances: Vec<Task> = Vec::with_capacity(occurrences.len());
    let mut last: Option<NaiveDate> = None;

    for &due_date in occurrences {
        if last.is_some_and(|prev| due_date <= prev) {
            debug!(parent = %parent.id, %due_date, "dropping out-of-order occurrence");
            continue;
        }

        let id = ids.next_id();
        if id == parent.id {
            return Err(CoreError::InvalidInput(format!(
                "Identity allocator returned the parent's id {}",
                parent.id
            )));
        }

        instances.push(Task {
            id,
            title: template.title.clone(),
            description: template.description.clone(),
            category: template.category.clone(),
            priority: template.priority,
            due_date: Some(due_date),
            completed: false,
            completed_at: None,
            created_at,
            parent_task_id: Some(parent.id),
            recurring_instance: true,
            recurrence: None,
        });
        last = Some(due_date);
    }

    Ok(instances)
}
