//! Calendar arithmetic on naive dates.
//!
//! Every function returns `None` instead of panicking when a result falls
//! outside chrono's representable range.

use chrono::{Datelike, Days, NaiveDate};

pub const DAYS_PER_WEEK: u64 = 7;

/// Number of days in the given month (1-based).
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_year, next_month) = if month == 12 { (year.checked_add(1)?, 1) } else { (year, month + 1) };
    let next_first = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    u32::try_from(next_first.signed_duration_since(first).num_days()).ok()
}

/// Year and month reached by moving `months` forward from `date`'s month.
pub fn shift_months(date: NaiveDate, months: u64) -> Option<(i32, u32)> {
    let base = i64::from(date.year()) * 12 + i64::from(date.month0());
    let total = base.checked_add(i64::try_from(months).ok()?)?;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12)).ok()? + 1;
    Some((year, month))
}

/// `day` of the given month, clamped to the month's last day.
pub fn clamped_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = days_in_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

/// Last calendar day of the given month.
pub fn last_day(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, days_in_month(year, month)?)
}

pub fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt().map_or(true, |next| next.month() != date.month())
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
}

pub fn add_days(date: NaiveDate, days: u64) -> Option<NaiveDate> {
    date.checked_add_days(Days::new(days))
}
