//! Occurrence generation.
//!
//! [`Occurrences`] expands a validated [`RecurrenceRule`] into the dates
//! strictly after an anchor. Stepped cadences compute the k-th date from
//! the anchor directly, so the same inputs always reproduce the same
//! sequence and a clamped monthly date never drifts. The sequence always
//! ends: at the rule's end condition, at the hard cap, or when the
//! calendar runs out of representable dates.

use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

use crate::calendar::{self, DAYS_PER_WEEK};
use crate::error::RuleError;
use crate::recurrence::{validate_rule, Cadence, EndCondition, MonthlyAnchor, RecurrenceRule, WeekdaySet};

/// Hard limit on emitted occurrences for any single rule.
pub const DEFAULT_MAX_OCCURRENCES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub max_occurrences: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
        }
    }
}

/// Expands rules into occurrence dates under a fixed configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct OccurrenceGenerator {
    config: GeneratorConfig,
}

impl OccurrenceGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Validates `rule` and returns the lazy sequence of dates after `anchor`.
    pub fn generate(&self, rule: &RecurrenceRule, anchor: NaiveDate) -> Result<Occurrences, RuleError> {
        validate_rule(rule)?;
        Occurrences::new(rule.clone(), anchor, self.config.max_occurrences)
    }

    /// Collects the full sequence, failing on the first error.
    pub fn collect(&self, rule: &RecurrenceRule, anchor: NaiveDate) -> Result<Vec<NaiveDate>, RuleError> {
        self.generate(rule, anchor)?.collect()
    }
}

/// Generates occurrences with the default cap.
pub fn generate_occurrences(rule: &RecurrenceRule, anchor: NaiveDate) -> Result<Occurrences, RuleError> {
    OccurrenceGenerator::default().generate(rule, anchor)
}

#[derive(Debug, Clone)]
enum Cursor {
    /// k-th step from the anchor (daily, plain weekly, monthly).
    Stepped { step: u64 },
    /// Day-by-day scan within weekly periods.
    WeekdayScan {
        days: WeekdaySet,
        current: NaiveDate,
        period_start: NaiveDate,
    },
}

/// Lazy, finite, strictly increasing sequence of occurrence dates.
#[derive(Debug, Clone)]
pub struct Occurrences {
    rule: RecurrenceRule,
    anchor: NaiveDate,
    cursor: Cursor,
    cap: usize,
    emitted: usize,
    finished: bool,
    truncated: bool,
}

impl Occurrences {
    fn new(rule: RecurrenceRule, anchor: NaiveDate, cap: usize) -> Result<Self, RuleError> {
        let cursor = match rule.cadence {
            Cadence::Weekly { days: Some(days) } => {
                if days.is_empty() {
                    return Err(RuleError::EmptyWeekdays);
                }
                Cursor::WeekdayScan {
                    days,
                    current: anchor,
                    // Before chrono's first Monday there is nothing to scan.
                    period_start: calendar::week_start(anchor).unwrap_or(anchor),
                }
            }
            _ => Cursor::Stepped { step: 0 },
        };

        debug!(%anchor, rule = %rule, cap, "generating occurrences");

        Ok(Self {
            rule,
            anchor,
            cursor,
            cap,
            emitted: 0,
            finished: false,
            truncated: false,
        })
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    /// Whether the sequence stopped at the hard cap while the rule itself
    /// would have produced more dates.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Number of dates emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    fn advance(&mut self) -> Result<Option<NaiveDate>, RuleError> {
        let frequency = u64::from(self.rule.frequency);
        match &mut self.cursor {
            Cursor::Stepped { step } => {
                *step += 1;
                let Some(distance) = frequency.checked_mul(*step) else {
                    return Ok(None);
                };
                Ok(stepped_date(&self.rule.cadence, self.anchor, distance))
            }
            Cursor::WeekdayScan {
                days,
                current,
                period_start,
            } => {
                let Some((next, next_period)) = next_matching_weekday(*days, frequency, *current, *period_start)? else {
                    return Ok(None);
                };
                *current = next;
                *period_start = next_period;
                Ok(Some(next))
            }
        }
    }

    fn finish(&mut self) -> Option<Result<NaiveDate, RuleError>> {
        self.finished = true;
        None
    }
}

impl Iterator for Occurrences {
    type Item = Result<NaiveDate, RuleError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if let EndCondition::After { count } = self.rule.end {
            if self.emitted >= count as usize {
                return self.finish();
            }
        }

        let candidate = match self.advance() {
            Ok(Some(date)) => date,
            Ok(None) => {
                debug!(anchor = %self.anchor, emitted = self.emitted, "calendar range exhausted");
                return self.finish();
            }
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        if let EndCondition::On { date } = self.rule.end {
            if candidate > date {
                return self.finish();
            }
        }

        if self.emitted >= self.cap {
            self.truncated = true;
            warn!(
                anchor = %self.anchor,
                rule = %self.rule,
                cap = self.cap,
                "occurrence generation truncated at cap"
            );
            return self.finish();
        }

        self.emitted += 1;
        Some(Ok(candidate))
    }
}

impl std::iter::FusedIterator for Occurrences {}

/// Date `distance` cadence units after `anchor`, or `None` past the calendar.
fn stepped_date(cadence: &Cadence, anchor: NaiveDate, distance: u64) -> Option<NaiveDate> {
    match cadence {
        Cadence::Daily => calendar::add_days(anchor, distance),
        Cadence::Weekly { .. } => calendar::add_days(anchor, distance.checked_mul(DAYS_PER_WEEK)?),
        Cadence::Monthly { anchor: monthly } => {
            let (year, month) = calendar::shift_months(anchor, distance)?;
            match monthly {
                MonthlyAnchor::Date(day) => calendar::clamped_day(year, month, *day),
                MonthlyAnchor::LastDay => calendar::last_day(year, month),
            }
        }
    }
}

/// Scans forward day by day from `current` for a weekday in `days`. Leaving
/// the current weekly period jumps `frequency` weeks ahead from its start.
/// Returns the match and the period it falls in.
fn next_matching_weekday(
    days: WeekdaySet,
    frequency: u64,
    current: NaiveDate,
    period_start: NaiveDate,
) -> Result<Option<(NaiveDate, NaiveDate)>, RuleError> {
    let mut day = current;
    let mut period = period_start;

    for _ in 0..DAYS_PER_WEEK {
        let Some(next) = day.succ_opt() else {
            return Ok(None);
        };
        day = next;

        let Some(period_end) = calendar::add_days(period, DAYS_PER_WEEK) else {
            return Ok(None);
        };
        if day >= period_end {
            let Some(gap) = frequency.checked_mul(DAYS_PER_WEEK) else {
                return Ok(None);
            };
            let Some(next_period) = calendar::add_days(period, gap) else {
                return Ok(None);
            };
            period = next_period;
            day = next_period;
        }

        if days.contains(day.weekday()) {
            return Ok(Some((day, period)));
        }
    }

    Err(RuleError::NoMatchingWeekday { after: current })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::is_last_day_of_month;
    use chrono::Weekday;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn collect(rule: &RecurrenceRule, anchor: NaiveDate) -> Vec<NaiveDate> {
        OccurrenceGenerator::default().collect(rule, anchor).unwrap()
    }

    mod daily_tests {
        use super::*;

        #[test]
        fn test_daily_after_three() {
            let rule = RecurrenceRule::daily(1).ending(EndCondition::After { count: 3 });
            assert_eq!(
                collect(&rule, date(2024, 1, 1)),
                vec![date(2024, 1, 2), date(2024, 1, 3), date(2024, 1, 4)]
            );
        }

        #[test]
        fn test_daily_frequency_steps_from_anchor() {
            let rule = RecurrenceRule::daily(10).ending(EndCondition::After { count: 4 });
            let dates = collect(&rule, date(2024, 2, 20));
            assert_eq!(
                dates,
                vec![date(2024, 3, 1), date(2024, 3, 11), date(2024, 3, 21), date(2024, 3, 31)]
            );
        }

        #[test]
        fn test_daily_end_on_is_inclusive() {
            let rule = RecurrenceRule::daily(2).ending(EndCondition::On {
                date: date(2024, 1, 7),
            });
            assert_eq!(
                collect(&rule, date(2024, 1, 1)),
                vec![date(2024, 1, 3), date(2024, 1, 5), date(2024, 1, 7)]
            );
        }

        #[test]
        fn test_end_on_before_first_candidate_yields_nothing() {
            let rule = RecurrenceRule::daily(1).ending(EndCondition::On {
                date: date(2024, 1, 1),
            });
            assert!(collect(&rule, date(2024, 1, 1)).is_empty());
        }
    }

    mod weekly_tests {
        use super::*;

        #[test]
        fn test_mon_wed_fri_until_tenth() {
            let rule = RecurrenceRule::weekly_on(1, [Weekday::Mon, Weekday::Wed, Weekday::Fri]).ending(
                EndCondition::On {
                    date: date(2024, 1, 10),
                },
            );
            assert_eq!(
                collect(&rule, date(2024, 1, 1)),
                vec![date(2024, 1, 3), date(2024, 1, 5), date(2024, 1, 8), date(2024, 1, 10)]
            );
        }

        #[test]
        fn test_every_other_week_skips_gap_week() {
            let rule = RecurrenceRule::weekly_on(2, [Weekday::Tue, Weekday::Thu])
                .ending(EndCondition::After { count: 4 });
            // Anchor Monday 2024-01-01: period zero is the anchor's week.
            assert_eq!(
                collect(&rule, date(2024, 1, 1)),
                vec![date(2024, 1, 2), date(2024, 1, 4), date(2024, 1, 16), date(2024, 1, 18)]
            );
        }

        #[test]
        fn test_single_weekday_matching_anchor_moves_to_next_period() {
            let rule = RecurrenceRule::weekly_on(1, [Weekday::Mon]).ending(EndCondition::After { count: 2 });
            assert_eq!(
                collect(&rule, date(2024, 1, 1)),
                vec![date(2024, 1, 8), date(2024, 1, 15)]
            );
        }

        #[test]
        fn test_anchor_mid_week() {
            // Anchor Saturday 2024-01-06; only Sunday remains in its week.
            let rule = RecurrenceRule::weekly_on(3, [Weekday::Mon, Weekday::Sun])
                .ending(EndCondition::After { count: 3 });
            assert_eq!(
                collect(&rule, date(2024, 1, 6)),
                vec![date(2024, 1, 7), date(2024, 1, 22), date(2024, 1, 28)]
            );
        }

        #[test]
        fn test_plain_weekly_steps() {
            let rule = RecurrenceRule::every_weeks(2).ending(EndCondition::After { count: 3 });
            assert_eq!(
                collect(&rule, date(2024, 1, 3)),
                vec![date(2024, 1, 17), date(2024, 1, 31), date(2024, 2, 14)]
            );
        }

        #[test]
        fn test_scan_is_bounded_without_matching_day() {
            let err = next_matching_weekday(WeekdaySet::new(), 1, date(2024, 1, 1), date(2024, 1, 1)).unwrap_err();
            assert_eq!(err, RuleError::NoMatchingWeekday { after: date(2024, 1, 1) });
        }

        #[test]
        fn test_empty_set_rejected_before_generation() {
            let rule = RecurrenceRule::weekly_on(1, []);
            assert_eq!(
                generate_occurrences(&rule, date(2024, 1, 1)).unwrap_err(),
                RuleError::EmptyWeekdays
            );
        }
    }

    mod monthly_tests {
        use super::*;

        #[test]
        fn test_date_mode_clamps_and_recovers() {
            let rule = RecurrenceRule::monthly_on(1, 31).ending(EndCondition::After { count: 4 });
            assert_eq!(
                collect(&rule, date(2024, 1, 31)),
                vec![date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30), date(2024, 5, 31)]
            );
        }

        #[test]
        fn test_date_mode_jumps_frequency_months() {
            let rule = RecurrenceRule::monthly_on(3, 15).ending(EndCondition::After { count: 3 });
            assert_eq!(
                collect(&rule, date(2024, 11, 20)),
                vec![date(2025, 2, 15), date(2025, 5, 15), date(2025, 8, 15)]
            );
        }

        #[rstest]
        #[case(1)]
        #[case(2)]
        #[case(5)]
        fn test_last_day_mode(#[case] frequency: u32) {
            let rule = RecurrenceRule::monthly_last_day(frequency).ending(EndCondition::After { count: 12 });
            let dates = collect(&rule, date(2023, 12, 15));
            assert_eq!(dates.len(), 12);
            assert!(dates.iter().all(|d| is_last_day_of_month(*d)));
            assert!(dates.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn test_last_day_mode_first_dates() {
            let rule = RecurrenceRule::monthly_last_day(1).ending(EndCondition::After { count: 3 });
            assert_eq!(
                collect(&rule, date(2024, 1, 10)),
                vec![date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]
            );
        }
    }

    mod termination_tests {
        use super::*;

        #[test]
        fn test_never_ending_rule_stops_at_cap() {
            let mut occurrences = generate_occurrences(&RecurrenceRule::daily(1), date(2024, 1, 1)).unwrap();
            let dates: Vec<NaiveDate> = occurrences.by_ref().map(Result::unwrap).collect();
            assert_eq!(dates.len(), DEFAULT_MAX_OCCURRENCES);
            assert!(occurrences.truncated());
            assert_eq!(occurrences.next(), None);
        }

        #[test]
        fn test_custom_cap() {
            let generator = OccurrenceGenerator::new(GeneratorConfig { max_occurrences: 5 });
            let rule = RecurrenceRule::daily(1).ending(EndCondition::After { count: 50 });
            let mut occurrences = generator.generate(&rule, date(2024, 1, 1)).unwrap();
            assert_eq!(occurrences.by_ref().count(), 5);
            assert!(occurrences.truncated());
        }

        #[test]
        fn test_end_count_equal_to_cap_is_not_truncated() {
            let generator = OccurrenceGenerator::new(GeneratorConfig { max_occurrences: 5 });
            let rule = RecurrenceRule::daily(1).ending(EndCondition::After { count: 5 });
            let mut occurrences = generator.generate(&rule, date(2024, 1, 1)).unwrap();
            assert_eq!(occurrences.by_ref().count(), 5);
            assert!(!occurrences.truncated());
        }

        #[test]
        fn test_end_date_reached_before_cap_is_not_truncated() {
            let rule = RecurrenceRule::daily(1).ending(EndCondition::On {
                date: date(2024, 1, 5),
            });
            let mut occurrences = generate_occurrences(&rule, date(2024, 1, 1)).unwrap();
            assert_eq!(occurrences.by_ref().count(), 4);
            assert!(!occurrences.truncated());
        }

        #[test]
        fn test_huge_frequency_ends_at_calendar_limit() {
            let rule = RecurrenceRule::daily(u32::MAX);
            let dates = collect(&rule, date(2024, 1, 1));
            assert!(dates.is_empty());

            let rule = RecurrenceRule::monthly_on(u32::MAX, 1);
            assert!(collect(&rule, date(2024, 1, 1)).is_empty());

            let rule = RecurrenceRule::weekly_on(u32::MAX, [Weekday::Sun]);
            assert_eq!(collect(&rule, date(2024, 1, 1)), vec![date(2024, 1, 7)]);
        }

        #[test]
        fn test_invalid_rule_rejected() {
            assert_eq!(
                generate_occurrences(&RecurrenceRule::daily(0), date(2024, 1, 1)).unwrap_err(),
                RuleError::ZeroFrequency
            );
        }

        #[test]
        fn test_restartable() {
            let rule = RecurrenceRule::weekly_on(1, [Weekday::Tue, Weekday::Sat]).ending(EndCondition::After { count: 9 });
            let first = collect(&rule, date(2024, 6, 12));
            let second = collect(&rule, date(2024, 6, 12));
            assert_eq!(first, second);
            assert_eq!(first.len(), 9);
        }
    }
}
