use anyhow::Result;
use cadence_core::lifecycle::RecurrenceLifecycleManager;
use cadence_core::models::NewTemplateData;
use cadence_core::store::{TaskStore, TemplateStore};
use chrono::Utc;
use owo_colors::{OwoColorize, Style};

use crate::cli::{TemplateCommand, TemplateSaveCommand};
use crate::config::Config;
use crate::parser::build_rule;
use crate::util::report_created;
use crate::views::table::display_templates;

pub async fn run_template<S: TaskStore + TemplateStore>(
    manager: &RecurrenceLifecycleManager<S>,
    command: TemplateCommand,
    config: &Config,
) -> Result<()> {
    match command {
        TemplateCommand::Save(save) => save_template(manager, save, config).await,
        TemplateCommand::List => {
            display_templates(&manager.list_templates().await?);
            Ok(())
        }
        TemplateCommand::Use(command) => {
            let change = manager.create_from_template(&command.name).await?;
            report_created(&change);
            Ok(())
        }
        TemplateCommand::Delete(command) => {
            manager.delete_template(&command.name).await?;
            println!("Template '{}' deleted.", command.name.trim());
            Ok(())
        }
    }
}

async fn save_template<S: TaskStore + TemplateStore>(
    manager: &RecurrenceLifecycleManager<S>,
    command: TemplateSaveCommand,
    config: &Config,
) -> Result<()> {
    let now = Utc::now();
    // Without --day a monthly rule takes its day from the due date a use today would get.
    let due_hint = command.due_in.and_then(|due| due.resolve(now.date_naive()));
    let recurrence = build_rule(&command.recurrence, due_hint, now)?;

    let template = manager
        .save_template(NewTemplateData {
            name: command.name,
            title: command.title,
            description: command.description,
            category: command.category,
            priority: Some(command.priority.unwrap_or(config.default_priority)),
            relative_due: command.due_in,
            recurrence,
        })
        .await?;

    let info_style = Style::new().blue();
    println!(
        "{} Saved template: {}",
        "✓".green().bold(),
        template.name.bright_white().bold()
    );
    if let Some(rule) = &template.recurrence {
        println!("  {} {}", "→".style(info_style), rule);
    }
    println!(
        "  {} Use it with: cadence template use {}",
        "•".bright_black(),
        template.name.yellow()
    );
    Ok(())
}
