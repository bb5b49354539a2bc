use anyhow::Result;
use cadence_core::lifecycle::RecurrenceLifecycleManager;
use cadence_core::models::NewTaskData;
use cadence_core::store::TaskStore;
use chrono::Utc;

use crate::cli::AddCommand;
use crate::config::Config;
use crate::parser::{build_rule, parse_date};
use crate::util::report_created;

pub async fn add_task<S: TaskStore>(
    manager: &RecurrenceLifecycleManager<S>,
    command: AddCommand,
    config: &Config,
) -> Result<()> {
    let now = Utc::now();
    let due_date = command.due.as_deref().map(|d| parse_date(d, now)).transpose()?;
    let recurrence = build_rule(&command.recurrence, due_date, now)?;

    let new_task_data = NewTaskData {
        title: command.title,
        description: command.description,
        category: command.category,
        priority: Some(command.priority.unwrap_or(config.default_priority)),
        due_date,
        recurrence,
    };

    let change = manager.create_task(new_task_data).await?;
    report_created(&change);
    Ok(())
}
