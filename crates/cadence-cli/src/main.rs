use std::sync::Arc;

use cadence_core::clock::SystemClock;
use cadence_core::db;
use cadence_core::error::CoreError;
use cadence_core::identity::UuidV7Allocator;
use cadence_core::lifecycle::RecurrenceLifecycleManager;
use cadence_core::store::SqliteStore;
use clap::Parser;
use dialoguer::Confirm;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::EnvFilter;
use util::resolve_task;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = match config::Config::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} Invalid configuration: {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    // Diagnostics go to stderr; stdout carries command output only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(path = %config.database_path, error = %e, "failed to open database");
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    let manager = RecurrenceLifecycleManager::new(
        SqliteStore::new(db_pool),
        Arc::new(UuidV7Allocator),
        Arc::new(SystemClock),
        config.generator_config(),
    );

    let result = match cli.command {
        cli::Commands::Add(command) => commands::add::add_task(&manager, command, &config).await,
        cli::Commands::List(command) => commands::list::list_tasks(&manager, command).await,
        cli::Commands::Show(command) => commands::show::show_task(&manager, command).await,
        cli::Commands::Edit(command) => commands::edit::edit_task(&manager, command).await,
        cli::Commands::Do(command) => commands::r#do::do_task(&manager, command).await,
        cli::Commands::Delete(command) => {
            let task = match resolve_task(&manager, &command.id).await {
                Ok(task) => task,
                Err(e) => {
                    handle_error(e);
                    std::process::exit(1);
                }
            };

            if !command.force {
                let prompt = if task.is_recurring() {
                    format!(
                        "Are you sure you want to delete task '{}' and all of its instances?",
                        task.title
                    )
                } else {
                    format!("Are you sure you want to delete task '{}'?", task.title)
                };
                let confirmation = Confirm::new()
                    .with_prompt(prompt)
                    .default(false)
                    .interact()
                    .unwrap_or(false);

                if !confirmation {
                    println!("Deletion cancelled.");
                    return;
                }
            }
            commands::delete::delete_task(&manager, task.id).await
        }
        cli::Commands::Regen(command) => commands::regen::regen_task(&manager, command).await,
        cli::Commands::Preview(command) => commands::preview::preview_rule(&manager, command).await,
        cli::Commands::Template(command) => {
            commands::template::run_template(&manager, command, &config).await
        }
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(core_error) = err.downcast_ref::<CoreError>() {
        match core_error {
            CoreError::NotFound(s) => {
                eprintln!("{} {}", "Error:".style(error_style), s);
            }
            CoreError::AmbiguousId(tasks) => {
                eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
                eprintln!("Did you mean one of these?");
                for (id, title) in tasks {
                    eprintln!("  {} ({})", id.yellow(), title);
                }
            }
            CoreError::InvalidInput(s) => {
                eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
            }
            CoreError::InvalidRule(reason) => {
                eprintln!(
                    "{} Invalid recurrence rule: {}",
                    "Error:".style(error_style),
                    reason.yellow()
                );
            }
            CoreError::UpdateFailed { task_id, source } => {
                eprintln!(
                    "{} Update failed for task {}: {}. Existing instances were left unchanged.",
                    "Error:".style(error_style),
                    task_id.short().yellow(),
                    source
                );
            }
            _ => eprintln!("{} {:#}", "Error:".style(error_style), err),
        }
    } else {
        eprintln!("{} {:#}", "Error:".style(error_style), err);
    }
}
