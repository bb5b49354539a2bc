//! Recurrence rules and their validation.
//!
//! A [`RecurrenceRule`] is a closed tagged union over the three cadences, so
//! a weekly rule can never carry a monthly date and vice versa. The
//! remaining invariants (positive frequency, non-empty weekday set, date
//! ranges) are checked by [`validate_rule`] before any generation happens.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clock::Clock;
use crate::error::RuleError;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Set of weekdays stored as a bit mask, iterated Monday first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Weekday>", into = "Vec<Weekday>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const fn new() -> Self {
        Self(0)
    }

    /// Monday through Friday.
    pub const fn weekdays() -> Self {
        Self(0b001_1111)
    }

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_monday()
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= Self::bit(day);
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEKDAYS.into_iter().filter(|day| self.contains(*day))
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = Self::new();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl From<Vec<Weekday>> for WeekdaySet {
    fn from(days: Vec<Weekday>) -> Self {
        days.into_iter().collect()
    }
}

impl From<WeekdaySet> for Vec<Weekday> {
    fn from(set: WeekdaySet) -> Self {
        set.iter().collect()
    }
}

/// Where a monthly rule lands inside the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MonthlyAnchor {
    /// Day of month in `1..=31`; clamped to the month's last day.
    Date(u32),
    LastDay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "interval", rename_all = "lowercase", deny_unknown_fields)]
pub enum Cadence {
    Daily,
    Weekly {
        /// `None` repeats on the anchor's weekday every `frequency` weeks.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        days: Option<WeekdaySet>,
    },
    Monthly {
        anchor: MonthlyAnchor,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase", deny_unknown_fields)]
pub enum EndCondition {
    #[default]
    Never,
    After {
        count: u32,
    },
    On {
        date: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecurrenceRule {
    pub cadence: Cadence,
    pub frequency: u32,
    #[serde(default)]
    pub end: EndCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
}

impl RecurrenceRule {
    pub fn daily(frequency: u32) -> Self {
        Self::with_cadence(Cadence::Daily, frequency)
    }

    pub fn weekly_on<I>(frequency: u32, days: I) -> Self
    where
        I: IntoIterator<Item = Weekday>,
    {
        Self::with_cadence(
            Cadence::Weekly {
                days: Some(days.into_iter().collect()),
            },
            frequency,
        )
    }

    /// Weekly on the anchor's own weekday.
    pub fn every_weeks(frequency: u32) -> Self {
        Self::with_cadence(Cadence::Weekly { days: None }, frequency)
    }

    pub fn monthly_on(frequency: u32, day: u32) -> Self {
        Self::with_cadence(
            Cadence::Monthly {
                anchor: MonthlyAnchor::Date(day),
            },
            frequency,
        )
    }

    pub fn monthly_last_day(frequency: u32) -> Self {
        Self::with_cadence(
            Cadence::Monthly {
                anchor: MonthlyAnchor::LastDay,
            },
            frequency,
        )
    }

    fn with_cadence(cadence: Cadence, frequency: u32) -> Self {
        Self {
            cadence,
            frequency,
            end: EndCondition::Never,
            start_date: None,
        }
    }

    pub fn ending(mut self, end: EndCondition) -> Self {
        self.end = end;
        self
    }

    pub fn starting_on(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    /// The date generation runs from for a task due on `due`: the later of
    /// the due date and an explicit start, whichever of the two is known,
    /// else the clock's current date.
    pub fn effective_start(&self, due: Option<NaiveDate>, clock: &dyn Clock) -> NaiveDate {
        match (due, self.start_date) {
            (Some(due), Some(start)) => due.max(start),
            (due, start) => due.or(start).unwrap_or_else(|| clock.today()),
        }
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        validate_rule(self)
    }

    /// Validates the rule as it would run from `start`, which stands in for
    /// the stored start date when checking the end date.
    pub fn validate_from(&self, start: NaiveDate) -> Result<(), RuleError> {
        check_rule(self, Some(start))
    }
}

/// Checks every rule invariant. Performs no repair.
pub fn validate_rule(rule: &RecurrenceRule) -> Result<(), RuleError> {
    check_rule(rule, rule.start_date)
}

fn check_rule(rule: &RecurrenceRule, start: Option<NaiveDate>) -> Result<(), RuleError> {
    if rule.frequency == 0 {
        return Err(RuleError::ZeroFrequency);
    }

    match &rule.cadence {
        Cadence::Daily => {}
        Cadence::Weekly { days } => {
            if days.is_some_and(|set| set.is_empty()) {
                return Err(RuleError::EmptyWeekdays);
            }
        }
        Cadence::Monthly { anchor } => {
            if let MonthlyAnchor::Date(day) = anchor {
                if !(1..=31).contains(day) {
                    return Err(RuleError::MonthlyDateOutOfRange(*day));
                }
            }
        }
    }

    match rule.end {
        EndCondition::Never => {}
        EndCondition::After { count } => {
            if count == 0 {
                return Err(RuleError::ZeroEndCount);
            }
        }
        EndCondition::On { date } => {
            if let Some(start) = start {
                if date < start {
                    return Err(RuleError::EndBeforeStart { end: date, start });
                }
            }
        }
    }

    Ok(())
}

fn ordinal_suffix(n: u32) -> &'static str {
    match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (singular, plural) = match self.cadence {
            Cadence::Daily => ("day", "days"),
            Cadence::Weekly { .. } => ("week", "weeks"),
            Cadence::Monthly { .. } => ("month", "months"),
        };
        if self.frequency == 1 {
            write!(f, "Every {singular}")?;
        } else {
            write!(f, "Every {} {plural}", self.frequency)?;
        }

        match &self.cadence {
            Cadence::Daily | Cadence::Weekly { days: None } => {}
            Cadence::Weekly { days: Some(days) } => {
                let names: Vec<String> = days.iter().map(|d| d.to_string()).collect();
                write!(f, " on {}", names.join(", "))?;
            }
            Cadence::Monthly {
                anchor: MonthlyAnchor::Date(day),
            } => write!(f, " on the {day}{}", ordinal_suffix(*day))?,
            Cadence::Monthly {
                anchor: MonthlyAnchor::LastDay,
            } => write!(f, " on the last day")?,
        }

        match self.end {
            EndCondition::Never => Ok(()),
            EndCondition::After { count: 1 } => write!(f, ", ending after 1 occurrence"),
            EndCondition::After { count } => write!(f, ", ending after {count} occurrences"),
            EndCondition::On { date } => write!(f, ", ending on {}", date.format("%Y-%m-%d")),
        }
    }
}
