use cadence_core::recurrence::{EndCondition, RecurrenceRule, WeekdaySet};
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use chrono_english::{parse_date_string, Dialect};
use thiserror::Error;

use crate::cli::{Interval, RecurrenceArgs};

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to parse date '{input}': {reason}")]
    InvalidDate { input: String, reason: String },

    #[error("Unknown weekday '{0}'. Use mon, tue, wed, thu, fri, sat or sun")]
    InvalidWeekday(String),

    #[error("Recurrence flags need --every daily|weekly|monthly")]
    MissingInterval,

    #[error("{flag} cannot be used with --every {interval}")]
    UnsupportedFlag { flag: &'static str, interval: Interval },
}

/// Parses an ISO date (`2024-03-01`) or an English expression such as
/// `tomorrow` or `next friday`, relative to `now`.
pub fn parse_date(input: &str, now: DateTime<Utc>) -> Result<NaiveDate, InputError> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date);
    }
    parse_date_string(input, now, Dialect::Uk)
        .map(|dt| dt.date_naive())
        .map_err(|e| InputError::InvalidDate {
            input: input.to_string(),
            reason: e.to_string(),
        })
}

/// Parses a comma-separated weekday list (`mon,wed,fri`).
pub fn parse_weekdays(input: &str) -> Result<WeekdaySet, InputError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Weekday>().map_err(|_| InputError::InvalidWeekday(s.to_string())))
        .collect()
}

/// Builds a rule from command-line flags. Returns `None` when no rule flag
/// was given. A monthly rule without `--day` or `--last-day` repeats on the
/// day of the month it is anchored to.
pub fn build_rule(
    args: &RecurrenceArgs,
    due: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> Result<Option<RecurrenceRule>, InputError> {
    let Some(interval) = args.every else {
        if args.is_present() {
            return Err(InputError::MissingInterval);
        }
        return Ok(None);
    };

    let start = args.start.as_deref().map(|s| parse_date(s, now)).transpose()?;
    let frequency = args.frequency.unwrap_or(1);
    let unsupported = |flag| InputError::UnsupportedFlag { flag, interval };

    let rule = match interval {
        Interval::Daily => {
            if args.on.is_some() {
                return Err(unsupported("--on"));
            }
            if args.day.is_some() {
                return Err(unsupported("--day"));
            }
            if args.last_day {
                return Err(unsupported("--last-day"));
            }
            RecurrenceRule::daily(frequency)
        }
        Interval::Weekly => {
            if args.day.is_some() {
                return Err(unsupported("--day"));
            }
            if args.last_day {
                return Err(unsupported("--last-day"));
            }
            match args.on.as_deref() {
                Some(days) => RecurrenceRule::weekly_on(frequency, parse_weekdays(days)?.iter()),
                None => RecurrenceRule::every_weeks(frequency),
            }
        }
        Interval::Monthly => {
            if args.on.is_some() {
                return Err(unsupported("--on"));
            }
            if args.last_day {
                RecurrenceRule::monthly_last_day(frequency)
            } else {
                let anchor = match (due, start) {
                    (Some(due), Some(start)) => due.max(start),
                    (due, start) => due.or(start).unwrap_or_else(|| now.date_naive()),
                };
                RecurrenceRule::monthly_on(frequency, args.day.unwrap_or_else(|| anchor.day()))
            }
        }
    };

    let rule = match (args.count, args.until.as_deref()) {
        (Some(count), _) => rule.ending(EndCondition::After { count }),
        (None, Some(until)) => rule.ending(EndCondition::On {
            date: parse_date(until, now)?,
        }),
        (None, None) => rule,
    };

    Ok(Some(match start {
        Some(date) => rule.starting_on(date),
        None => rule,
    }))
}
