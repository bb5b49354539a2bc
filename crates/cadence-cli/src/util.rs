use anyhow::Result;
use cadence_core::lifecycle::RecurrenceLifecycleManager;
use cadence_core::models::{RegenerationSummary, Task, TaskChange};
use cadence_core::store::TaskStore;
use owo_colors::{OwoColorize, Style};

pub async fn resolve_task<S: TaskStore>(manager: &RecurrenceLifecycleManager<S>, short_id: &str) -> Result<Task> {
    Ok(manager.resolve_short_id(short_id).await?)
}

/// Prints the outcome of an instance rebuild.
pub fn report_regeneration(summary: &RegenerationSummary) {
    let info_style = Style::new().blue();
    println!(
        "  {} {} instance(s) generated, {} removed",
        "→".style(info_style),
        summary.created.to_string().cyan(),
        summary.removed
    );
    if summary.truncated {
        println!(
            "  {} Stopped at the occurrence limit; later dates were not generated",
            "!".yellow().bold()
        );
    }
}

/// Prints a freshly created task, with its rule and instances if it repeats.
pub fn report_created(change: &TaskChange) {
    let task = &change.task;
    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();
    let subtle_style = Style::new().bright_black();

    match (&task.recurrence, &change.regeneration) {
        (Some(rule), Some(summary)) => {
            println!(
                "{} Created recurring task: {}",
                "✓".style(success_style),
                task.title.bright_white().bold()
            );
            println!("  {} Task ID: {}", "→".style(info_style), task.id.short().yellow());
            println!("  {} {}", "→".style(info_style), rule);
            report_regeneration(summary);
            println!(
                "\n   {} Show instances: cadence show {}",
                "•".style(subtle_style),
                task.id.short().yellow()
            );
        }
        _ => {
            println!(
                "{} Created task: {}",
                "✓".style(success_style),
                task.title.bright_white().bold()
            );
            println!("  {} Task ID: {}", "→".style(info_style), task.id.short().yellow());
            if let Some(due) = task.due_date {
                println!("  {} Due: {}", "→".style(info_style), due.to_string().cyan());
            }
        }
    }
}
