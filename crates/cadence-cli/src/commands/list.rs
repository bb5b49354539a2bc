use anyhow::Result;
use cadence_core::lifecycle::RecurrenceLifecycleManager;
use cadence_core::models::TaskFilter;
use cadence_core::store::TaskStore;

use crate::cli::ListCommand;
use crate::views::table::{display_tasks, ViewTask};

pub async fn list_tasks<S: TaskStore>(manager: &RecurrenceLifecycleManager<S>, command: ListCommand) -> Result<()> {
    let filter = TaskFilter {
        include_completed: command.all,
        parents_only: command.parents,
        category: command.category,
    };

    let tasks = manager.list_tasks(&filter).await?;
    let view_tasks: Vec<ViewTask> = tasks.iter().map(ViewTask::from).collect();
    display_tasks(&view_tasks);

    Ok(())
}
