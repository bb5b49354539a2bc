use anyhow::Result;
use cadence_core::lifecycle::RecurrenceLifecycleManager;
use cadence_core::store::TaskStore;
use chrono::Utc;
use owo_colors::OwoColorize;

use crate::cli::ShowCommand;
use crate::util::resolve_task;
use crate::views::table::{describe_due, display_tasks, ViewTask};

pub async fn show_task<S: TaskStore>(manager: &RecurrenceLifecycleManager<S>, command: ShowCommand) -> Result<()> {
    let task = resolve_task(manager, &command.id).await?;
    let today = Utc::now().date_naive();

    println!("{} {}", task.title.bright_white().bold(), format!("[{}]", task.id).bright_black());
    if let Some(description) = &task.description {
        println!("  {}", description);
    }
    println!("  Status:   {}", if task.completed { "Done" } else { "Pending" });
    println!("  Priority: {}", task.priority);
    if let Some(category) = &task.category {
        println!("  Category: {}", category);
    }
    if let Some(due) = task.due_date {
        println!("  Due:      {}", describe_due(due, today));
    }

    if let Some(parent_id) = task.parent_task_id {
        println!("  Instance of {}", parent_id.short().yellow());
        return Ok(());
    }

    if let Some(rule) = &task.recurrence {
        println!("  Repeats:  {}", rule.to_string().cyan());
        let instances = manager.instances_of(task.id).await?;
        println!();
        let view_tasks: Vec<ViewTask> = instances.iter().map(ViewTask::from).collect();
        display_tasks(&view_tasks);
    }

    Ok(())
}
