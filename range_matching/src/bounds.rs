//! Classification of the bounds of a range list.
use chrono::NaiveDate;
use common::{table::parse_iso_date, AwError, AwResult, Value};
use std::iter::once;

/// A range list whose bounds have been checked to share one representation.
/// Built once by [classify_ranges]; comparisons work on the variant and never look at the original
/// [Value]s again.
#[derive(Clone, Debug, PartialEq)]
pub enum RangeBounds<'r> {
    /// Every bound is a `YYYY-MM-DD` string. Rows are compared as strings of the same form.
    Strings(Vec<(&'r str, &'r str)>),
    /// Every bound is a plain date. Rows are compared as dates.
    Dates(Vec<(NaiveDate, NaiveDate)>),
}

impl<'r> RangeBounds<'r> {
    /// The number of ranges.
    pub fn len(&self) -> usize {
        match self {
            RangeBounds::Strings(ranges) => ranges.len(),
            RangeBounds::Dates(ranges) => ranges.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn unsupported(value: &Value) -> AwError {
    AwError::UnsupportedBoundType {
        value: format!("{:?}", value),
    }
}

fn as_iso_str(value: &Value) -> Option<&str> {
    match value {
        Value::Text(text) if parse_iso_date(text).is_some() => Some(text.as_str()),
        _ => None,
    }
}

fn as_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Date(date) => Some(*date),
        _ => None,
    }
}

/// Checks that all bounds share one representation and returns the matching [RangeBounds].
/// The representation is decided by the first bound; an empty list counts as
/// [RangeBounds::Strings].
///
/// # Returns
/// - `Err(UnsupportedBoundType)` naming the first bound which is not a well formed `YYYY-MM-DD`
///   string in a string list, not a plain date in a date list, or neither (e.g. a timestamp).
pub fn classify_ranges(ranges: &[(Value, Value)]) -> AwResult<RangeBounds<'_>> {
    let mut bounds = ranges
        .iter()
        .flat_map(|(start, end)| once(start).chain(once(end)));

    match ranges.first() {
        None => Ok(RangeBounds::Strings(Vec::new())),
        Some((Value::Text(_), _)) => {
            if let Some(offending) = bounds.find(|bound| as_iso_str(bound).is_none()) {
                return Err(unsupported(offending));
            }
            Ok(RangeBounds::Strings(
                ranges
                    .iter()
                    .filter_map(|(start, end)| Some((as_iso_str(start)?, as_iso_str(end)?)))
                    .collect(),
            ))
        }
        Some((Value::Date(_), _)) => {
            if let Some(offending) = bounds.find(|bound| as_date(bound).is_none()) {
                return Err(unsupported(offending));
            }
            Ok(RangeBounds::Dates(
                ranges
                    .iter()
                    .filter_map(|(start, end)| Some((as_date(start)?, as_date(end)?)))
                    .collect(),
            ))
        }
        Some((other, _)) => Err(unsupported(other)),
    }
}
