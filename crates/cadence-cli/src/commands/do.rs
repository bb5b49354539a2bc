use anyhow::Result;
use cadence_core::lifecycle::RecurrenceLifecycleManager;
use cadence_core::store::TaskStore;
use owo_colors::OwoColorize;

use crate::cli::DoCommand;
use crate::util::resolve_task;

pub async fn do_task<S: TaskStore>(manager: &RecurrenceLifecycleManager<S>, command: DoCommand) -> Result<()> {
    let task = resolve_task(manager, &command.id).await?;
    let task = manager.toggle_complete(task.id).await?;

    if task.completed {
        println!("{} Completed task: '{}'", "✓".green().bold(), task.title);
    } else {
        println!("Reopened task: '{}'", task.title);
    }

    Ok(())
}
