use anyhow::{bail, Result};
use cadence_core::lifecycle::RecurrenceLifecycleManager;
use cadence_core::models::UpdateTaskData;
use cadence_core::store::TaskStore;
use chrono::Utc;
use owo_colors::OwoColorize;

use crate::cli::EditCommand;
use crate::parser::{build_rule, parse_date};
use crate::util::{report_regeneration, resolve_task};

pub async fn edit_task<S: TaskStore>(manager: &RecurrenceLifecycleManager<S>, command: EditCommand) -> Result<()> {
    let task = resolve_task(manager, &command.id).await?;
    let now = Utc::now();

    let due_date = if command.due_clear {
        Some(None)
    } else {
        command.due.as_deref().map(|d| parse_date(d, now)).transpose()?.map(Some)
    };

    let recurrence = if command.no_recurrence {
        Some(None)
    } else {
        let anchor = due_date.flatten().or(task.due_date);
        build_rule(&command.recurrence, anchor, now)?.map(Some)
    };

    let description = if command.description_clear {
        Some(None)
    } else {
        command.description.map(Some)
    };

    let category = if command.category_clear {
        Some(None)
    } else {
        command.category.map(Some)
    };

    let update_data = UpdateTaskData {
        title: command.title,
        description,
        category,
        priority: command.priority,
        due_date,
        recurrence,
    };

    if update_data.is_empty() {
        bail!("Nothing to change. Pass at least one field to edit.");
    }

    let change = manager.update_task(task.id, update_data).await?;

    println!("{} Updated task: {}", "✓".green().bold(), change.task.title.bright_white().bold());
    match (&change.task.recurrence, &change.regeneration) {
        (Some(rule), Some(summary)) => {
            println!("  {} {}", "→".blue(), rule);
            report_regeneration(summary);
        }
        (None, Some(summary)) => {
            println!("  {} No longer repeats", "→".blue());
            report_regeneration(summary);
        }
        _ => {}
    }

    Ok(())
}
