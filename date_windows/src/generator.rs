//! The window arithmetic itself.
//!
//! A "year" in this module is always the fixed unit of 52 weeks, so stepping back any number of
//! years lands on the same weekday. This drifts from the calendar anniversary by a day per year
//! (two around leap days), which is accepted.
use chrono::{Duration, NaiveDate};
use common::{AwError, AwResult};

/// How many weeks one fixed-length year has.
pub const WEEKS_PER_YEAR: i64 = 52;

/// An inclusive `(start, end)` range of dates spanning a whole number of weeks.
pub type Window = (NaiveDate, NaiveDate);

fn checked_shift(date: NaiveDate, days: i64) -> AwResult<NaiveDate> {
    Duration::try_days(days)
        .and_then(|duration| date.checked_add_signed(duration))
        .ok_or(AwError::DateOutOfRange)
}

fn non_negative(parameter: &'static str, value: i64) -> AwResult<i64> {
    if value < 0 {
        return Err(AwError::InvalidWindowParameters { parameter, value });
    }
    Ok(value)
}

/// The number of days between the first and last day of a window spanning `weeks` weeks.
/// A week count of zero is treated like one.
fn window_span_days(weeks: i64) -> i64 {
    6 + 7 * (weeks - 1).max(0)
}

/// Return the date that lies `years_back` fixed-length years before `reference`.
/// The result always has the same weekday as `reference`.
///
/// ```
/// # use chrono::NaiveDate;
/// # use date_windows::anchor_years_back;
/// let anchor = anchor_years_back(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), 2).unwrap();
/// assert_eq!(anchor, NaiveDate::from_ymd_opt(2023, 3, 4).unwrap());
/// ```
///
/// # Returns
/// - `Err(InvalidWindowParameters)` if `years_back` is negative.
/// - `Err(DateOutOfRange)` if the result is not representable.
pub fn anchor_years_back(reference: NaiveDate, years_back: i64) -> AwResult<NaiveDate> {
    let years_back = non_negative("years_back", years_back)?;
    let days = years_back
        .checked_mul(WEEKS_PER_YEAR * 7)
        .ok_or(AwError::DateOutOfRange)?;
    checked_shift(reference, -days)
}

/// The `weeks_back` weeks ending on the anchor `years_back` years before `reference`.
/// With `years_back = 0` this is the window ending on `reference` itself.
pub fn previous_window(reference: NaiveDate, weeks_back: i64, years_back: i64) -> AwResult<Window> {
    let weeks_back = non_negative("weeks_back", weeks_back)?;
    let end = anchor_years_back(reference, years_back)?;
    let start = checked_shift(end, -window_span_days(weeks_back))?;
    Ok((start, end))
}

/// [previous_window] for every year from `0` to `years_back` inclusive, most recent first.
pub fn previous_windows_over_years(
    reference: NaiveDate,
    weeks_back: i64,
    years_back: i64,
) -> AwResult<Vec<Window>> {
    let years_back = non_negative("years_back", years_back)?;
    (0..=years_back)
        .map(|years| previous_window(reference, weeks_back, years))
        .collect()
}

/// The `weeks_forward` weeks starting the day after `reference`, as they were `years_back` years
/// ago.
/// # Returns
/// - `Err(InvalidWindowParameters)` if `years_back < 1` or `weeks_forward < 0`.
pub fn next_window(reference: NaiveDate, weeks_forward: i64, years_back: i64) -> AwResult<Window> {
    let weeks_forward = non_negative("weeks_forward", weeks_forward)?;
    if years_back < 1 {
        return Err(AwError::InvalidWindowParameters {
            parameter: "years_back",
            value: years_back,
        });
    }
    let start = anchor_years_back(checked_shift(reference, 1)?, years_back)?;
    let end = checked_shift(start, window_span_days(weeks_forward))?;
    Ok((start, end))
}

/// [next_window] for every year from `1` to `years_back` inclusive, most recent first.
/// `years_back = 0` gives no windows.
pub fn next_windows_over_years(
    reference: NaiveDate,
    weeks_forward: i64,
    years_back: i64,
) -> AwResult<Vec<Window>> {
    let years_back = non_negative("years_back", years_back)?;
    (1..=years_back)
        .map(|years| next_window(reference, weeks_forward, years))
        .collect()
}
