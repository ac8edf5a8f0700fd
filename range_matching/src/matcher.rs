//! Tagging table rows with the first date range they fall in.
use crate::bounds::{classify_ranges, RangeBounds};
use chrono::{NaiveDate, NaiveDateTime};
use common::table::{midnight, parse_date_time, DATE_FORMAT};
use common::{AwError, AwResult, Column, Table, Value};
use rayon::prelude::*;

/// Name of the column holding the start of the matched range.
pub const MATCH_START: &str = "matchStart";
/// Name of the column holding the end of the matched range.
pub const MATCH_END: &str = "matchEnd";

/// The rows of a table which fell into at least one range.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchedTable {
    /// The matched rows in their original order, with all original columns followed by
    /// [MATCH_START] and [MATCH_END].
    pub table: Table,
    /// For each row of `table`, the index of the range it was matched to.
    pub range_indices: Vec<usize>,
}

impl MatchedTable {
    /// Returns the range the given row was matched to, exactly as it was passed to
    /// [filter_in_ranges].
    pub fn original_bounds<'r>(
        &self,
        row: usize,
        ranges: &'r [(Value, Value)],
    ) -> Option<&'r (Value, Value)> {
        self.range_indices
            .get(row)
            .and_then(|&index| ranges.get(index))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn into_table(self) -> Table {
        self.table
    }
}

/// Converts every value of the column `name` to a date, for comparison only.
/// Timestamps are truncated to their date, text is parsed with [parse_date_time].
///
/// # Returns
/// - `Err(UnparseableColumnValue)` for the first value that can not be read as a date. Numeric
///   columns are never dates.
pub fn normalize_column(table: &Table, name: &str) -> AwResult<Vec<NaiveDate>> {
    let unparseable = |row: usize, value: String| AwError::UnparseableColumnValue {
        column: name.to_string(),
        row,
        value,
    };

    match table.column(name)? {
        Column::Timestamp(values) => Ok(values.iter().map(NaiveDateTime::date).collect()),
        Column::Date(values) => Ok(values.clone()),
        Column::Text(values) => values
            .iter()
            .enumerate()
            .map(|(row, value)| {
                parse_date_time(value)
                    .map(|timestamp| timestamp.date())
                    .ok_or_else(|| unparseable(row, value.clone()))
            })
            .collect(),
        numeric => match numeric.value(0) {
            Some(value) => Err(unparseable(0, value.to_string())),
            None => Ok(Vec::new()),
        },
    }
}

/// For every value, the index of the first range containing it, if any.
/// Ranges are inclusive on both ends and are checked in the given order, so with overlapping
/// ranges the one listed first wins.
pub fn first_matches<T>(values: &[T], ranges: &[(T, T)]) -> Vec<Option<usize>>
where
    T: PartialOrd + Sync,
{
    values
        .par_iter()
        .map(|value| {
            ranges
                .iter()
                .position(|(start, end)| start <= value && value <= end)
        })
        .collect()
}

/// Converts an original range bound into the timestamp stored in the match columns.
fn bound_as_timestamp(bound: &Value) -> AwResult<NaiveDateTime> {
    match bound {
        Value::Date(date) => Ok(midnight(*date)),
        Value::Text(text) => parse_date_time(text).ok_or_else(|| AwError::UnsupportedBoundType {
            value: format!("{:?}", bound),
        }),
        other => Err(AwError::UnsupportedBoundType {
            value: format!("{:?}", other),
        }),
    }
}

/// Returns the rows of `table` whose `column` (compared at date precision) falls into any of the
/// `[start, end]` ranges, together with the first range each row matched.
///
/// The bounds must be either all `YYYY-MM-DD` strings or all plain dates. They are never
/// converted for the comparison: string bounds are compared against the column formatted as
/// `YYYY-MM-DD`, date bounds against the column as dates. The resulting [MATCH_START] and
/// [MATCH_END] columns are timestamps at midnight of the matched bounds, for both kinds of bounds.
/// An empty range list matches nothing.
///
/// ```
/// # use common::{Column, Table, Value};
/// # use range_matching::filter_in_ranges;
/// let table = Table::new(vec![(
///     "start".to_string(),
///     Column::Text(vec!["2024-10-12T08:00:00".into(), "2024-10-20T08:00:00".into()]),
/// )])
/// .unwrap();
/// let ranges = vec![(Value::from("2024-10-09"), Value::from("2024-10-15"))];
///
/// let matched = filter_in_ranges(&table, "start", &ranges).unwrap();
/// assert_eq!(matched.len(), 1);
/// assert_eq!(matched.original_bounds(0, &ranges), Some(&ranges[0]));
/// ```
///
/// # Returns
/// - `Err(UnsupportedBoundType)` if the bounds are mixed or of another type.
/// - `Err(UnparseableColumnValue)` if a value of `column` is not a date.
/// - `Err(MissingColumn)` if there is no such column.
/// - `Err(DuplicateColumn)` if `table` already has a [MATCH_START] or [MATCH_END] column.
pub fn filter_in_ranges(
    table: &Table,
    column: &str,
    ranges: &[(Value, Value)],
) -> AwResult<MatchedTable> {
    let bounds = classify_ranges(ranges)?;
    for name in [MATCH_START, MATCH_END].iter() {
        if table.has_column(name) {
            return Err(AwError::DuplicateColumn(name.to_string()));
        }
    }

    let dates = normalize_column(table, column)?;
    let matches = match &bounds {
        RangeBounds::Strings(string_ranges) => {
            let formatted: Vec<String> = dates
                .iter()
                .map(|date| date.format(DATE_FORMAT).to_string())
                .collect();
            let formatted: Vec<&str> = formatted.iter().map(String::as_str).collect();
            first_matches(&formatted, string_ranges)
        }
        RangeBounds::Dates(date_ranges) => first_matches(&dates, date_ranges),
    };

    let (rows, range_indices): (Vec<usize>, Vec<usize>) = matches
        .into_iter()
        .enumerate()
        .filter_map(|(row, range)| range.map(|range| (row, range)))
        .unzip();

    let match_start = range_indices
        .iter()
        .map(|&index| bound_as_timestamp(&ranges[index].0))
        .collect::<AwResult<Vec<_>>>()?;
    let match_end = range_indices
        .iter()
        .map(|&index| bound_as_timestamp(&ranges[index].1))
        .collect::<AwResult<Vec<_>>>()?;

    log::debug!(
        "{} of {} rows of column {} fall into one of {} ranges",
        rows.len(),
        table.len(),
        column,
        bounds.len()
    );

    let table = table
        .take_rows(&rows)
        .with_column(MATCH_START, Column::Timestamp(match_start))?
        .with_column(MATCH_END, Column::Timestamp(match_end))?;

    Ok(MatchedTable {
        table,
        range_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_helpers::{date_ranges, naive_date};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn timestamp(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        date(year, month, day).and_hms_opt(hour, 0, 0).unwrap()
    }

    fn activities() -> Table {
        Table::new(vec![
            (
                "start".into(),
                Column::Timestamp(vec![
                    timestamp(2024, 10, 12, 7),
                    timestamp(2024, 10, 20, 18),
                    timestamp(2023, 10, 17, 23),
                    timestamp(2024, 10, 9, 0),
                ]),
            ),
            ("distanceMiles".into(), Column::Float(vec![3.5, 7.25, 2.0, 4.0])),
        ])
        .unwrap()
    }

    fn text(value: &str) -> Value {
        Value::from(value)
    }

    #[test]
    fn string_ranges_keep_matching_rows() {
        let ranges = vec![(text("2024-10-09"), text("2024-10-15"))];
        let matched = filter_in_ranges(&activities(), "start", &ranges).unwrap();

        assert_eq!(matched.range_indices, vec![0, 0]);
        assert_eq!(
            matched.table.column("distanceMiles").unwrap(),
            &Column::Float(vec![3.5, 4.0])
        );
        assert_eq!(
            matched.table.column(MATCH_START).unwrap(),
            &Column::Timestamp(vec![midnight(date(2024, 10, 9)); 2])
        );
        assert_eq!(
            matched.table.column(MATCH_END).unwrap(),
            &Column::Timestamp(vec![midnight(date(2024, 10, 15)); 2])
        );
        assert_eq!(matched.original_bounds(1, &ranges), Some(&ranges[0]));
    }

    #[test]
    fn output_keeps_original_columns_in_order() {
        let ranges = vec![(text("2024-10-09"), text("2024-10-15"))];
        let matched = filter_in_ranges(&activities(), "start", &ranges).unwrap();
        assert_eq!(
            matched.table.column_names().collect::<Vec<_>>(),
            vec!["start", "distanceMiles", MATCH_START, MATCH_END]
        );
    }

    #[test]
    fn date_ranges_match_like_string_ranges() {
        let as_strings = vec![
            (text("2024-10-09"), text("2024-10-15")),
            (text("2023-10-11"), text("2023-10-17")),
        ];
        let as_dates = vec![
            (Value::Date(date(2024, 10, 9)), Value::Date(date(2024, 10, 15))),
            (Value::Date(date(2023, 10, 11)), Value::Date(date(2023, 10, 17))),
        ];
        let by_strings = filter_in_ranges(&activities(), "start", &as_strings).unwrap();
        let by_dates = filter_in_ranges(&activities(), "start", &as_dates).unwrap();

        assert_eq!(by_strings, by_dates);
        assert_eq!(by_dates.range_indices, vec![0, 1, 0]);
    }

    #[test]
    fn timestamps_are_compared_at_date_precision() {
        // 2023-10-17 23:00 is still inside a range ending on 2023-10-17
        let ranges = vec![(Value::Date(date(2023, 10, 11)), Value::Date(date(2023, 10, 17)))];
        let matched = filter_in_ranges(&activities(), "start", &ranges).unwrap();
        assert_eq!(
            matched.table.column("start").unwrap(),
            &Column::Timestamp(vec![timestamp(2023, 10, 17, 23)])
        );
    }

    #[test]
    fn first_listed_range_wins_on_overlap() {
        let ranges = vec![
            (text("2024-10-01"), text("2024-10-31")),
            (text("2024-10-09"), text("2024-10-15")),
        ];
        let matched = filter_in_ranges(&activities(), "start", &ranges).unwrap();
        assert_eq!(matched.range_indices, vec![0, 0, 0]);
        assert_eq!(
            matched.table.column(MATCH_START).unwrap(),
            &Column::Timestamp(vec![midnight(date(2024, 10, 1)); 3])
        );
    }

    #[test]
    fn text_columns_are_parsed() {
        let table = Table::new(vec![(
            "start".into(),
            Column::Text(vec![
                "2024-10-12T07:30:00".into(),
                "2024-10-20 18:00:00".into(),
                "2024-10-15".into(),
            ]),
        )])
        .unwrap();
        let ranges = vec![(text("2024-10-09"), text("2024-10-15"))];
        let matched = filter_in_ranges(&table, "start", &ranges).unwrap();
        assert_eq!(
            matched.table.column("start").unwrap(),
            &Column::Text(vec!["2024-10-12T07:30:00".into(), "2024-10-15".into()])
        );
    }

    #[test]
    fn unparseable_values_fail_the_whole_call() {
        let table = Table::new(vec![(
            "start".into(),
            Column::Text(vec!["2024-10-12".into(), "soon".into()]),
        )])
        .unwrap();
        let ranges = vec![(text("2024-10-09"), text("2024-10-15"))];
        match filter_in_ranges(&table, "start", &ranges) {
            Err(AwError::UnparseableColumnValue { column, row, value }) => {
                assert_eq!(column, "start");
                assert_eq!(row, 1);
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn numeric_columns_are_not_dates() {
        let ranges = vec![(text("2024-10-09"), text("2024-10-15"))];
        assert!(matches!(
            filter_in_ranges(&activities(), "distanceMiles", &ranges),
            Err(AwError::UnparseableColumnValue { .. })
        ));
    }

    #[test]
    fn unsupported_bounds_fail_before_anything_else() {
        let ranges = vec![(text("2024-10-09"), Value::Date(date(2024, 10, 15)))];
        assert!(matches!(
            filter_in_ranges(&activities(), "no such column", &ranges),
            Err(AwError::UnsupportedBoundType { .. })
        ));
    }

    #[test]
    fn missing_column_is_reported() {
        let ranges = vec![(text("2024-10-09"), text("2024-10-15"))];
        assert!(matches!(
            filter_in_ranges(&activities(), "end", &ranges),
            Err(AwError::MissingColumn(name)) if name == "end"
        ));
    }

    #[test]
    fn annotated_tables_can_not_be_annotated_again() {
        let ranges = vec![(text("2024-10-09"), text("2024-10-15"))];
        let matched = filter_in_ranges(&activities(), "start", &ranges).unwrap();
        assert!(matches!(
            filter_in_ranges(&matched.table, "start", &ranges),
            Err(AwError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn empty_range_list_gives_empty_result() {
        let matched = filter_in_ranges(&activities(), "start", &[]).unwrap();
        assert!(matched.is_empty());
        assert!(matched.table.has_column(MATCH_START));
        assert!(matched.table.has_column(MATCH_END));
    }

    #[test]
    fn ranges_are_left_untouched() {
        let ranges = vec![
            (text("2024-10-09"), text("2024-10-15")),
            (text("2023-10-11"), text("2023-10-17")),
        ];
        let before = ranges.clone();
        filter_in_ranges(&activities(), "start", &ranges).unwrap();
        assert_eq!(ranges, before);

        let broken = vec![(text("2024-10-09"), Value::Int(3))];
        let before = broken.clone();
        assert!(filter_in_ranges(&activities(), "start", &broken).is_err());
        assert_eq!(broken, before);
    }

    proptest! {
        #[test]
        fn first_matches_agree_with_a_scan_over_all_ranges(
            values in prop::collection::vec(naive_date(), 0..64),
            ranges in date_ranges(8),
        ) {
            let matches = first_matches(&values, &ranges);
            prop_assert_eq!(matches.len(), values.len());
            for (value, found) in values.iter().zip(matches) {
                let containing: Vec<usize> = ranges
                    .iter()
                    .enumerate()
                    .filter(|(_, (start, end))| start <= value && value <= end)
                    .map(|(index, _)| index)
                    .collect();
                prop_assert_eq!(found, containing.first().copied());
            }
        }

        #[test]
        fn string_and_date_bounds_select_the_same_rows(
            values in prop::collection::vec(naive_date(), 1..64),
            ranges in date_ranges(8),
        ) {
            let table = Table::new(vec![("day".into(), Column::Date(values))]).unwrap();
            let as_dates: Vec<(Value, Value)> = ranges
                .iter()
                .map(|&(start, end)| (Value::Date(start), Value::Date(end)))
                .collect();
            let as_strings: Vec<(Value, Value)> = ranges
                .iter()
                .map(|(start, end)| {
                    (
                        Value::Text(start.format(DATE_FORMAT).to_string()),
                        Value::Text(end.format(DATE_FORMAT).to_string()),
                    )
                })
                .collect();

            let by_dates = filter_in_ranges(&table, "day", &as_dates).unwrap();
            let by_strings = filter_in_ranges(&table, "day", &as_strings).unwrap();
            prop_assert_eq!(&by_dates, &by_strings);
            prop_assert!(by_dates.len() <= table.len());

            if let Column::Timestamp(starts) = by_dates.table.column(MATCH_START).unwrap() {
                for (row, start) in starts.iter().enumerate() {
                    let index = by_dates.range_indices[row];
                    prop_assert_eq!(start.date(), ranges[index].0);
                }
            } else {
                prop_assert!(false, "matchStart is not a timestamp column");
            }
        }
    }
}
