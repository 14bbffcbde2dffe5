//! Calendar week arithmetic.
//!
//! Weeks are anchored on the first Monday of the year: that Monday opens
//! week 1 and every following Monday opens the next week. Days that fall
//! before the first Monday are counted as week 1 of the same year rather
//! than the last week of the previous one. Stored triggers and selections
//! are keyed on these numbers, so the rule must not drift to ISO-8601.

use chrono::{Datelike, Duration, NaiveDate};

/// Zero-based day-of-year of the first Monday, derived from any date in
/// that year.
fn first_monday_ordinal0(date: NaiveDate) -> u32 {
    let weekday = date.weekday().num_days_from_monday();
    let jan1_weekday = (weekday + 7 - date.ordinal0() % 7) % 7;
    (7 - jan1_weekday) % 7
}

pub fn first_monday(year: i32) -> Option<NaiveDate> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    jan1.checked_add_signed(Duration::days(first_monday_ordinal0(jan1) as i64))
}

/// Week number of `date` within its own year
pub fn week_number_of(date: NaiveDate) -> u32 {
    let offset = first_monday_ordinal0(date);
    let ordinal0 = date.ordinal0();
    if ordinal0 < offset {
        1
    } else {
        (ordinal0 - offset) / 7 + 1
    }
}

pub fn week_start(year: i32, week: u32) -> Option<NaiveDate> {
    let monday = first_monday(year)?;
    monday.checked_add_signed(Duration::weeks(week as i64 - 1))
}

pub fn week_end(year: i32, week: u32) -> Option<NaiveDate> {
    week_start(year, week)?.checked_add_signed(Duration::days(6))
}

/// The week before the one whose range contains `date`
pub fn previous_week(date: NaiveDate) -> Option<(i32, u32)> {
    week_containing(date.checked_sub_signed(Duration::days(7))?)
}

/// (year, week) whose date range actually contains `date`. Differs from
/// `week_number_of` only for the days before the first Monday, which sit in
/// the last week of the previous year's range.
pub fn week_containing(date: NaiveDate) -> Option<(i32, u32)> {
    if date < first_monday(date.year())? {
        let dec31 = NaiveDate::from_ymd_opt(date.year() - 1, 12, 31)?;
        return Some((dec31.year(), week_number_of(dec31)));
    }
    Some((date.year(), week_number_of(date)))
}

/// First and last day of a calendar month
pub fn month_bounds(month: u32, year: i32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// (month, year) of the month before the one containing `date`
pub fn previous_month(date: NaiveDate) -> (u32, i32) {
    if date.month() == 1 {
        (12, date.year() - 1)
    } else {
        (date.month() - 1, date.year())
    }
}
