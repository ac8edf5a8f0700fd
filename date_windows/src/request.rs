//! Window requests as they are read from configuration files.
use crate::{next_windows_over_years, previous_windows_over_years, Window};
use chrono::NaiveDate;
use common::{table::DATE_FORMAT, AwResult, Value};
use derive_builder::Builder;
use serde::Deserialize;

/// Which form the bounds of generated ranges should take.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum BoundRepresentation {
    /// `YYYY-MM-DD` strings
    Text,
    /// plain dates
    Date,
}

impl Default for BoundRepresentation {
    fn default() -> Self {
        BoundRepresentation::Text
    }
}

/// The same `weeks_back` weeks ending on the reference date, for this year and `years_back`
/// earlier years.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Builder)]
#[builder(pattern = "owned")]
pub struct PreviousWeeks {
    /// How many weeks each window spans.
    #[builder(default = "1")]
    pub weeks_back: i64,
    /// How many earlier years to generate windows for, 0 = only this year.
    #[builder(default = "0")]
    pub years_back: i64,
}

impl Default for PreviousWeeks {
    fn default() -> Self {
        Self {
            weeks_back: 1,
            years_back: 0,
        }
    }
}

/// The `weeks_forward` weeks after the reference date, for each of the last `years_back` years.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Builder)]
#[builder(pattern = "owned")]
pub struct NextWeeks {
    /// How many weeks each window spans.
    #[builder(default = "1")]
    pub weeks_forward: i64,
    /// How many earlier years to generate windows for, 1 = only last year.
    #[builder(default = "1")]
    pub years_back: i64,
}

impl Default for NextWeeks {
    fn default() -> Self {
        Self {
            weeks_forward: 1,
            years_back: 1,
        }
    }
}

/// Describes a list of windows relative to a reference date which is only supplied later.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum WindowRequest {
    Previous(PreviousWeeks),
    Next(NextWeeks),
}

impl Default for WindowRequest {
    fn default() -> Self {
        WindowRequest::Previous(PreviousWeeks::default())
    }
}

impl WindowRequest {
    /// Generates the windows for `reference`, most recent first.
    pub fn windows(&self, reference: NaiveDate) -> AwResult<Vec<Window>> {
        let windows = match self {
            WindowRequest::Previous(previous) => {
                previous_windows_over_years(reference, previous.weeks_back, previous.years_back)
            }
            WindowRequest::Next(next) => {
                next_windows_over_years(reference, next.weeks_forward, next.years_back)
            }
        }?;
        log::debug!(
            "{:?} relative to {} gives {} windows",
            self,
            reference,
            windows.len()
        );
        Ok(windows)
    }

    /// Generates the windows for `reference` as ranges a range matcher accepts.
    pub fn ranges(
        &self,
        reference: NaiveDate,
        representation: BoundRepresentation,
    ) -> AwResult<Vec<(Value, Value)>> {
        Ok(self
            .windows(reference)?
            .into_iter()
            .map(|window| window_to_bounds(window, representation))
            .collect())
    }
}

/// Formats both ends of a window as `YYYY-MM-DD`.
pub fn window_to_strings((start, end): Window) -> (String, String) {
    (
        start.format(DATE_FORMAT).to_string(),
        end.format(DATE_FORMAT).to_string(),
    )
}

/// Converts a window into a pair of range bounds of the given representation.
pub fn window_to_bounds(window: Window, representation: BoundRepresentation) -> (Value, Value) {
    match representation {
        BoundRepresentation::Text => {
            let (start, end) = window_to_strings(window);
            (Value::Text(start), Value::Text(end))
        }
        BoundRepresentation::Date => (Value::Date(window.0), Value::Date(window.1)),
    }
}
