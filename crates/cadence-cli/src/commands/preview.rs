use anyhow::{anyhow, Result};
use cadence_core::lifecycle::RecurrenceLifecycleManager;
use cadence_core::store::TaskStore;
use chrono::{NaiveDate, Utc};
use owo_colors::OwoColorize;

use crate::cli::PreviewCommand;
use crate::parser::{build_rule, parse_date};
use crate::views::table::display_occurrences;

pub async fn preview_rule<S: TaskStore>(manager: &RecurrenceLifecycleManager<S>, command: PreviewCommand) -> Result<()> {
    let now = Utc::now();
    let from = command.from.as_deref().map(|d| parse_date(d, now)).transpose()?;
    let rule = build_rule(&command.recurrence, from, now)?
        .ok_or_else(|| anyhow!("Preview needs a rule: pass --every daily|weekly|monthly"))?;

    let mut occurrences = manager.preview(&rule, from)?;
    let dates = occurrences
        .by_ref()
        .take(command.limit)
        .collect::<Result<Vec<NaiveDate>, _>>()?;

    println!("{} {}", "Rule:".bold(), rule);
    println!("{} {}", "After:".bold(), occurrences.anchor());
    display_occurrences(&dates);

    if occurrences.next().is_some() {
        println!("{}", format!("Showing the first {} dates.", dates.len()).bright_black());
    }

    Ok(())
}
