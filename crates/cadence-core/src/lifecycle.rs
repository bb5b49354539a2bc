//! Recurrence lifecycle.
//!
//! [`RecurrenceLifecycleManager`] drives each parent task between the
//! non-recurring and recurring states. Every transition that touches the
//! rule or its anchor rebuilds the instance set and hands it to the store
//! as one atomic replace, so a parent never shows a mix of old and new
//! instances. Rebuilds of the same parent are serialized; distinct
//! parents proceed independently.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument, warn};

use crate::clock::Clock;
use crate::error::CoreError;
use crate::identity::IdAllocator;
use crate::materialization::TaskInstanceMaterializer;
use crate::models::{
    DeletionSummary, NewTaskData, RegenerationSummary, Task, TaskChange, TaskFilter, TaskId,
    UpdateTaskData,
};
use crate::occurrence::{GeneratorConfig, OccurrenceGenerator, Occurrences};
use crate::recurrence::RecurrenceRule;
use crate::store::TaskStore;

/// Shortest prefix accepted by [`RecurrenceLifecycleManager::resolve_short_id`].
pub const MIN_SHORT_ID_LEN: usize = 2;

type ParentLocks = Mutex<HashMap<TaskId, Arc<AsyncMutex<()>>>>;

pub struct RecurrenceLifecycleManager<S> {
    pub(crate) store: S,
    pub(crate) clock: Arc<dyn Clock>,
    ids: Arc<dyn IdAllocator>,
    materializer: TaskInstanceMaterializer,
    generator: OccurrenceGenerator,
    parent_locks: ParentLocks,
}

/// Exclusive hold on one parent. Dropping it releases the lock and prunes
/// the parent's entry once nobody else is waiting on it.
struct ParentGuard<'a> {
    locks: &'a ParentLocks,
    id: TaskId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ParentGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(&self.id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.id);
        }
    }
}

impl<S: TaskStore> RecurrenceLifecycleManager<S> {
    pub fn new(store: S, ids: Arc<dyn IdAllocator>, clock: Arc<dyn Clock>, config: GeneratorConfig) -> Self {
        Self {
            store,
            clock,
            materializer: TaskInstanceMaterializer::new(Arc::clone(&ids)),
            ids,
            generator: OccurrenceGenerator::new(config),
            parent_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn generator(&self) -> &OccurrenceGenerator {
        &self.generator
    }

    /// Creates a task. With a rule, the parent and its generated instances
    /// are written together or not at all.
    #[instrument(skip(self, data), fields(title = %data.title))]
    pub async fn create_task(&self, data: NewTaskData) -> Result<TaskChange, CoreError> {
        let title = normalize_title(&data.title)?;
        let recurrence = data
            .recurrence
            .map(|rule| self.prepare_rule(rule, data.due_date))
            .transpose()?;

        let task = Task {
            id: self.ids.next_id(),
            title,
            description: data.description,
            category: data.category,
            priority: data.priority.unwrap_or_default(),
            due_date: data.due_date,
            completed: false,
            completed_at: None,
            created_at: self.clock.now(),
            parent_task_id: None,
            recurring_instance: false,
            recurrence,
        };

        if !task.is_recurring() {
            self.store.insert(task.clone()).await?;
            info!(task = %task.id, "task created");
            return Ok(TaskChange {
                task,
                regeneration: None,
            });
        }

        let _guard = self.lock_parent(task.id).await;
        let summary = self.rebuild_instances(&task).await?;
        info!(task = %task.id, instances = summary.created, "recurring task created");
        Ok(TaskChange {
            task,
            regeneration: Some(summary),
        })
    }

    /// Applies `data` to a task. A change to the rule, to whether the task
    /// recurs, or to its due date rebuilds the instance set; other edits
    /// touch the record alone and leave existing instances as they are.
    #[instrument(skip(self, data))]
    pub async fn update_task(&self, id: TaskId, data: UpdateTaskData) -> Result<TaskChange, CoreError> {
        if data.is_empty() {
            return Err(CoreError::InvalidInput("Nothing to update".to_string()));
        }

        let _guard = self.lock_parent(id).await;
        let existing = self.require(id).await?;

        if existing.recurring_instance && matches!(data.recurrence, Some(Some(_))) {
            return Err(CoreError::InvalidInput(format!(
                "Task {} is a recurring instance; set the rule on its parent instead",
                existing.id.short()
            )));
        }

        let mut task = existing.clone();
        if let Some(title) = data.title {
            task.title = normalize_title(&title)?;
        }
        if let Some(description) = data.description {
            task.description = description;
        }
        if let Some(category) = data.category {
            task.category = category;
        }
        if let Some(priority) = data.priority {
            task.priority = priority;
        }
        if let Some(due_date) = data.due_date {
            task.due_date = due_date;
        }
        let rule_replaced = data.recurrence.is_some();
        if let Some(recurrence) = data.recurrence {
            task.recurrence = recurrence;
        }
        // A moved due date moves the start of generation, so the kept rule
        // is checked again against it.
        if rule_replaced || task.due_date != existing.due_date {
            task.recurrence = task
                .recurrence
                .take()
                .map(|rule| self.prepare_rule(rule, task.due_date))
                .transpose()?;
        }

        let rule_changed = task.recurrence != existing.recurrence;
        let anchor_moved = task.due_date != existing.due_date && task.is_recurring();

        if task.recurring_instance || !(rule_changed || anchor_moved) {
            self.store.update(task.clone()).await?;
            debug!(task = %task.id, "task updated without regeneration");
            return Ok(TaskChange {
                task,
                regeneration: None,
            });
        }

        let summary = self.rebuild_instances(&task).await?;
        Ok(TaskChange {
            task,
            regeneration: Some(summary),
        })
    }

    /// Discards and rebuilds a parent's instance set from its current rule.
    /// A parent without a rule ends up with no instances.
    #[instrument(skip(self))]
    pub async fn regenerate_for_parent(&self, parent_id: TaskId) -> Result<RegenerationSummary, CoreError> {
        let _guard = self.lock_parent(parent_id).await;
        let parent = self.require(parent_id).await?;
        if parent.recurring_instance {
            return Err(CoreError::InvalidInput(format!(
                "Task {} is a recurring instance, not a parent",
                parent.id.short()
            )));
        }
        self.rebuild_instances(&parent).await
    }

    /// Deletes a task. A parent takes all of its instances with it; an
    /// instance is removed on its own.
    #[instrument(skip(self))]
    pub async fn delete_task(&self, id: TaskId) -> Result<DeletionSummary, CoreError> {
        let task = self.require(id).await?;

        if task.recurring_instance {
            if !self.store.remove(id).await? {
                return Err(CoreError::NotFound(id.to_string()));
            }
            info!(task = %id, "instance deleted");
            return Ok(DeletionSummary {
                task_id: id,
                instances_removed: 0,
            });
        }

        let guard = self.lock_parent(id).await;
        let instances_removed = self.store.remove_with_instances(id).await?;
        drop(guard);

        info!(task = %id, instances_removed, "task deleted");
        Ok(DeletionSummary {
            task_id: id,
            instances_removed,
        })
    }

    /// Flips the completion state of one record. Never regenerates and
    /// never touches the parent or sibling instances.
    #[instrument(skip(self))]
    pub async fn toggle_complete(&self, id: TaskId) -> Result<Task, CoreError> {
        let mut task = self.require(id).await?;
        task.completed = !task.completed;
        task.completed_at = task.completed.then(|| self.clock.now());
        self.store.update(task.clone()).await?;
        info!(task = %id, completed = task.completed, "completion toggled");
        Ok(task)
    }

    pub async fn find_task(&self, id: TaskId) -> Result<Option<Task>, CoreError> {
        self.store.find_by_id(id).await
    }

    pub async fn instances_of(&self, parent_id: TaskId) -> Result<Vec<Task>, CoreError> {
        self.store.find_by_parent_id(parent_id).await
    }

    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, CoreError> {
        let tasks = self.store.find_all().await?;
        Ok(tasks.into_iter().filter(|t| filter.matches(t)).collect())
    }

    /// Resolves a full id or a short hex prefix to exactly one task.
    pub async fn resolve_short_id(&self, short_id: &str) -> Result<Task, CoreError> {
        let short_id = short_id.trim();
        if short_id.len() < MIN_SHORT_ID_LEN {
            return Err(CoreError::InvalidInput(format!(
                "Short ID must be at least {} characters long.",
                MIN_SHORT_ID_LEN
            )));
        }

        if let Ok(id) = short_id.parse::<TaskId>() {
            return self
                .store
                .find_by_id(id)
                .await?
                .ok_or_else(|| CoreError::NotFound(id.to_string()));
        }

        let mut tasks = self.store.find_by_id_prefix(short_id).await?;
        match tasks.len() {
            0 => Err(CoreError::NotFound(format!(
                "No task found with ID prefix '{}'",
                short_id
            ))),
            1 => Ok(tasks.remove(0)),
            _ => Err(CoreError::AmbiguousId(
                tasks.into_iter().map(|t| (t.id.to_string(), t.title)).collect(),
            )),
        }
    }

    /// Occurrences a rule would produce, without persisting anything. The
    /// sequence runs from `from`, or from the rule's start date when that is
    /// later; with neither it runs from today.
    pub fn preview(&self, rule: &RecurrenceRule, from: Option<NaiveDate>) -> Result<Occurrences, CoreError> {
        let rule = self.prepare_rule(rule.clone(), from)?;
        let start = rule.effective_start(from, self.clock.as_ref());
        Ok(self.generator.generate(&rule, start)?)
    }

    /// Validates `rule` as it will run for a task due on `due`. An undated
    /// task without a start date gets today as its start, so rebuilds stay
    /// on the same dates.
    fn prepare_rule(&self, rule: RecurrenceRule, due: Option<NaiveDate>) -> Result<RecurrenceRule, CoreError> {
        let rule = match (due, rule.start_date) {
            (None, None) => rule.starting_on(self.clock.today()),
            _ => rule,
        };
        rule.validate_from(rule.effective_start(due, self.clock.as_ref()))?;
        Ok(rule)
    }

    /// Generates and materializes the instance set `parent` should own.
    fn plan_instances(&self, parent: &Task) -> Result<(Vec<Task>, bool), CoreError> {
        let Some(rule) = parent.recurrence.as_ref().filter(|_| parent.is_recurring()) else {
            return Ok((Vec::new(), false));
        };

        let start = rule.effective_start(parent.due_date, self.clock.as_ref());
        let mut occurrences = self.generator.generate(rule, start)?;
        let dates = occurrences.by_ref().collect::<Result<Vec<_>, _>>()?;
        let truncated = occurrences.truncated();

        let instances = self.materializer.materialize(parent, &dates, self.clock.now())?;
        Ok((instances, truncated))
    }

    /// Upserts `parent` and swaps in a freshly planned instance set.
    /// Callers hold the parent's lock.
    async fn rebuild_instances(&self, parent: &Task) -> Result<RegenerationSummary, CoreError> {
        let (instances, truncated) = self.plan_instances(parent)?;
        let created = instances.len();

        let removed = self
            .store
            .replace_instances(parent, instances)
            .await
            .map_err(|e| {
                error!(parent = %parent.id, error = %e, "instance replacement failed");
                e.into_update_failure(parent.id)
            })?;

        if truncated {
            warn!(parent = %parent.id, created, "instance set truncated at the occurrence cap");
        }
        info!(parent = %parent.id, removed, created, "instances regenerated");

        Ok(RegenerationSummary {
            parent_id: parent.id,
            removed,
            created,
            truncated,
        })
    }

    async fn require(&self, id: TaskId) -> Result<Task, CoreError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    async fn lock_parent(&self, id: TaskId) -> ParentGuard<'_> {
        let lock = {
            let mut locks = self.parent_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id).or_default())
        };
        ParentGuard {
            locks: &self.parent_locks,
            id,
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn held_locks(&self) -> usize {
        self.parent_locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn normalize_title(title: &str) -> Result<String, CoreError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(CoreError::InvalidInput("Task title cannot be empty".to_string()));
    }
    Ok(title.to_string())
}
