//! US trading calendar.
//!
//! A day is non-trading when it falls on a weekend or on one of nine
//! holidays: New Year's Day, Martin Luther King Jr. Day (3rd Monday of
//! January), Presidents' Day (3rd Monday of February), Memorial Day (last
//! Monday of May), Independence Day, Labor Day (1st Monday of September),
//! Veterans Day, Thanksgiving (4th Thursday of November) and Christmas.
//! Fixed-date holidays are not shifted when they land on a weekend.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};

/// Trading hours are [09:00, 16:00): a purchase at 16:00 is already too late.
const OPENING_HOUR: u32 = 9;
const CLOSING_HOUR: u32 = 16;

pub fn is_non_trading_day(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun) || is_market_holiday(date)
}

pub fn is_market_holiday(date: NaiveDate) -> bool {
    let fixed = matches!(
        (date.month(), date.day()),
        (1, 1) | (7, 4) | (11, 11) | (12, 25)
    );
    if fixed {
        return true;
    }

    let weekday = date.weekday();
    let nth = weekday_occurrence(date);
    match (date.month(), weekday) {
        (1, Weekday::Mon) | (2, Weekday::Mon) => nth == 3,
        (5, Weekday::Mon) => is_last_occurrence(date),
        (9, Weekday::Mon) => nth == 1,
        (11, Weekday::Thu) => nth == 4,
        _ => false,
    }
}

pub fn is_within_trading_hours(time: NaiveTime) -> bool {
    (OPENING_HOUR..CLOSING_HOUR).contains(&time.hour())
}

/// First trading day on or after `date`.
pub fn next_trading_day(date: NaiveDate) -> NaiveDate {
    let mut day = date;
    while is_non_trading_day(day) {
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    day
}

/// Most recent trading day on or before `date`.
pub fn previous_trading_day(date: NaiveDate) -> NaiveDate {
    let mut day = date;
    while is_non_trading_day(day) {
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    day
}

/// 1-based index of this weekday within its month (the 3rd Monday is 3).
fn weekday_occurrence(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

fn is_last_occurrence(date: NaiveDate) -> bool {
    let next_week = date + chrono::Duration::days(7);
    next_week.month() != date.month()
}
