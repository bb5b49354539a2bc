use anyhow::{bail, Result};
use cadence_core::lifecycle::RecurrenceLifecycleManager;
use cadence_core::store::TaskStore;
use owo_colors::OwoColorize;

use crate::cli::RegenCommand;
use crate::util::{report_regeneration, resolve_task};

pub async fn regen_task<S: TaskStore>(manager: &RecurrenceLifecycleManager<S>, command: RegenCommand) -> Result<()> {
    let task = resolve_task(manager, &command.id).await?;
    if !task.is_recurring() {
        bail!("Task '{}' does not repeat; nothing to regenerate", task.title);
    }

    let summary = manager.regenerate_for_parent(task.id).await?;
    println!("{} Regenerated instances of '{}'", "✓".green().bold(), task.title);
    report_regeneration(&summary);
    Ok(())
}
