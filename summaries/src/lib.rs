#![cfg_attr(feature = "strict", deny(warnings))]
#![cfg_attr(feature = "strict", deny(clippy::all))]
#![cfg_attr(feature = "strict", deny(missing_docs))]

//! This crate aggregates the rows of a matched table per window, e.g. the total distance of all
//! activities in each of the last ten years' "last four weeks", and compares them to their median.
use chrono::{Datelike, Months, NaiveDate};
use common::{table::DATE_FORMAT, AwError, AwResult, Column, Table};
use range_matching::{normalize_column, MATCH_START};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the values of one column are combined within a window.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum Aggregation {
    /// Sum of a numeric column. `NaN` values are skipped.
    Sum,
    /// Number of rows with a value in the column. `NaN` values are not counted.
    Count,
}

/// One aggregated value of a [WindowSummary].
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Metric {
    /// Name of the metric in the output.
    pub name: String,
    /// The column to aggregate.
    pub column: String,
    pub aggregation: Aggregation,
}

impl Metric {
    /// Creates a new metric.
    pub fn new(name: &str, column: &str, aggregation: Aggregation) -> Self {
        Self {
            name: name.to_string(),
            column: column.to_string(),
            aggregation,
        }
    }

    fn aggregate(&self, table: &Table, rows: &[usize]) -> AwResult<f64> {
        let column = table.column(&self.column)?;
        match (self.aggregation, column) {
            (Aggregation::Count, Column::Float(values)) => {
                Ok(rows.iter().filter(|&&row| !values[row].is_nan()).count() as f64)
            }
            (Aggregation::Count, _) => Ok(rows.len() as f64),
            (Aggregation::Sum, Column::Float(_)) | (Aggregation::Sum, Column::Int(_)) => Ok(rows
                .iter()
                .filter_map(|&row| column.as_f64(row))
                .filter(|value| !value.is_nan())
                .sum()),
            (Aggregation::Sum, other) => Err(AwError::StringAwError(format!(
                "Can not sum up {} column {} for metric {}",
                other.type_name(),
                self.column,
                self.name
            ))),
        }
    }
}

/// A value computed from another metric of the same window, `round(metric / divisor)`, e.g.
/// hours from minutes.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DerivedMetric {
    /// Name of the derived value in the output.
    pub name: String,
    /// Name of the [Metric] this is derived from.
    pub metric: String,
    /// What the metric is divided by before rounding.
    pub divisor: f64,
}

impl DerivedMetric {
    /// Creates a new derived metric.
    pub fn new(name: &str, metric: &str, divisor: f64) -> Self {
        Self {
            name: name.to_string(),
            metric: metric.to_string(),
            divisor,
        }
    }

    fn derive(&self, window: &WindowSummary) -> AwResult<f64> {
        window
            .value(&self.metric)
            .map(|value| (value / self.divisor).round_ties_even())
            .ok_or_else(|| {
                AwError::StringAwError(format!(
                    "Can not derive {} from unknown metric {}",
                    self.name, self.metric
                ))
            })
    }
}

/// The aggregated metrics of all rows matched to one window.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowSummary {
    /// The start of the window, `None` for rows that aggregate over windows like the median.
    pub match_start: Option<NaiveDate>,
    /// `YYYY-MM-DD` of `match_start` or a free text label.
    pub label: String,
    /// Metric name to value.
    pub values: BTreeMap<String, f64>,
}

impl WindowSummary {
    /// Returns the value of the given metric.
    pub fn value(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied()
    }
}

/// Summaries of all windows which matched at least one row, ordered by window start.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Summary {
    /// The names of the aggregated metrics.
    pub metrics: Vec<String>,
    pub windows: Vec<WindowSummary>,
}

fn median(mut values: Vec<f64>) -> f64 {
    values.retain(|value| !value.is_nan());
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

impl Summary {
    /// A row holding the median of every metric over all windows.
    pub fn median(&self, label: &str) -> WindowSummary {
        WindowSummary {
            match_start: None,
            label: label.to_string(),
            values: self
                .metrics
                .iter()
                .map(|metric| {
                    let values = self
                        .windows
                        .iter()
                        .filter_map(|window| window.value(metric))
                        .collect();
                    (metric.clone(), median(values))
                })
                .collect(),
        }
    }

    /// The window with the latest start, if any window matched.
    pub fn latest(&self) -> Option<&WindowSummary> {
        self.windows.last()
    }

    /// Adds the derived metrics to every window. They are treated like any other metric
    /// afterwards, in particular [Summary::median] takes the median of the derived values.
    pub fn with_derived(mut self, derived: &[DerivedMetric]) -> AwResult<Self> {
        for window in self.windows.iter_mut() {
            for metric in derived {
                let value = metric.derive(window)?;
                window.values.insert(metric.name.clone(), value);
            }
        }
        self.metrics
            .extend(derived.iter().map(|metric| metric.name.clone()));
        Ok(self)
    }

    /// All windows followed by the [Summary::median] row.
    pub fn with_median(&self, label: &str) -> Vec<WindowSummary> {
        let mut rows = self.windows.clone();
        rows.push(self.median(label));
        rows
    }
}

fn aggregate_rows(
    table: &Table,
    metrics: &[Metric],
    rows: &[usize],
) -> AwResult<BTreeMap<String, f64>> {
    metrics
        .iter()
        .map(|metric| Ok((metric.name.clone(), metric.aggregate(table, rows)?)))
        .collect()
}

fn month_start(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)
}

/// Groups the rows of a table produced by [range_matching::filter_in_ranges] by their
/// [MATCH_START] and aggregates every metric per group.
/// Windows which matched no row do not show up.
pub fn summarize(matched: &Table, metrics: &[Metric]) -> AwResult<Summary> {
    let starts = match matched.column(MATCH_START)? {
        Column::Timestamp(values) => values,
        other => {
            return Err(AwError::StringAwError(format!(
                "Expected {} to be a timestamp column, but it is a {} column",
                MATCH_START,
                other.type_name()
            )))
        }
    };

    let mut groups: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (row, start) in starts.iter().enumerate() {
        groups.entry(start.date()).or_default().push(row);
    }

    let windows = groups
        .into_iter()
        .map(|(start, rows)| {
            Ok(WindowSummary {
                match_start: Some(start),
                label: start.format(DATE_FORMAT).to_string(),
                values: aggregate_rows(matched, metrics, &rows)?,
            })
        })
        .collect::<AwResult<Vec<_>>>()?;

    log::debug!(
        "Summarized {} rows into {} windows",
        matched.len(),
        windows.len()
    );

    Ok(Summary {
        metrics: metrics.iter().map(|metric| metric.name.clone()).collect(),
        windows,
    })
}

/// Aggregates every metric per calendar month of `date_column`, for each month from the month of
/// `first` to the month of `last`, inclusive. Every month shows up; months without rows have
/// `NaN` for every metric. Rows outside the months are ignored.
pub fn summarize_months(
    table: &Table,
    date_column: &str,
    metrics: &[Metric],
    first: NaiveDate,
    last: NaiveDate,
) -> AwResult<Summary> {
    let dates = normalize_column(table, date_column)?;
    let mut groups: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (row, date) in dates.iter().enumerate() {
        if let Some(month) = month_start(*date) {
            groups.entry(month).or_default().push(row);
        }
    }

    let mut windows = Vec::new();
    let mut month = month_start(first);
    let last = month_start(last);
    while let Some(current) = month.filter(|current| Some(*current) <= last) {
        let values = match groups.get(&current) {
            Some(rows) => aggregate_rows(table, metrics, rows)?,
            None => metrics
                .iter()
                .map(|metric| (metric.name.clone(), f64::NAN))
                .collect(),
        };
        windows.push(WindowSummary {
            match_start: Some(current),
            label: current.format("%Y-%m").to_string(),
            values,
        });
        month = current.checked_add_months(Months::new(1));
    }

    log::debug!(
        "Summarized {} rows into {} months",
        table.len(),
        windows.len()
    );

    Ok(Summary {
        metrics: metrics.iter().map(|metric| metric.name.clone()).collect(),
        windows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use common::Value;
    use proptest::prelude::*;
    use range_matching::filter_in_ranges;
    use test_helpers::activity_table;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn metrics() -> Vec<Metric> {
        vec![
            Metric::new("totalDistanceMiles", "distanceMiles", Aggregation::Sum),
            Metric::new("totalActivities", "folder", Aggregation::Count),
            Metric::new("totalClimbFeet", "climbFeet", Aggregation::Sum),
        ]
    }

    fn matched() -> Table {
        let table = Table::new(vec![
            (
                "start".into(),
                Column::Text(vec![
                    "2024-10-10T08:00:00".into(),
                    "2024-10-12T08:00:00".into(),
                    "2023-10-12T08:00:00".into(),
                    "2022-10-06T08:00:00".into(),
                    "2022-10-07T08:00:00".into(),
                    "2022-10-08T08:00:00".into(),
                    "2021-01-01T08:00:00".into(),
                ]),
            ),
            (
                "distanceMiles".into(),
                Column::Float(vec![3.0, 4.5, 10.0, 1.0, f64::NAN, 2.0, 99.0]),
            ),
            (
                "climbFeet".into(),
                Column::Int(vec![100, 200, 50, 10, 20, 30, 999]),
            ),
            ("folder".into(), Column::Text(vec!["2024".into(); 7])),
        ])
        .unwrap();
        let ranges = vec![
            (Value::from("2024-10-09"), Value::from("2024-10-15")),
            (Value::from("2023-10-11"), Value::from("2023-10-17")),
            (Value::from("2022-10-05"), Value::from("2022-10-11")),
        ];
        filter_in_ranges(&table, "start", &ranges)
            .unwrap()
            .into_table()
    }

    #[test]
    fn windows_are_grouped_by_start_in_ascending_order() {
        let summary = summarize(&matched(), &metrics()).unwrap();
        let labels: Vec<&str> = summary
            .windows
            .iter()
            .map(|window| window.label.as_str())
            .collect();
        assert_eq!(labels, vec!["2022-10-05", "2023-10-11", "2024-10-09"]);
        assert_eq!(summary.latest().unwrap().match_start, Some(date(2024, 10, 9)));
    }

    #[test]
    fn sums_skip_nan_and_counts_count_rows() {
        let summary = summarize(&matched(), &metrics()).unwrap();
        let oldest = &summary.windows[0];
        assert_approx_eq!(oldest.value("totalDistanceMiles").unwrap(), 3.0);
        assert_approx_eq!(oldest.value("totalActivities").unwrap(), 3.0);
        assert_approx_eq!(oldest.value("totalClimbFeet").unwrap(), 60.0);

        let latest = summary.latest().unwrap();
        assert_approx_eq!(latest.value("totalDistanceMiles").unwrap(), 7.5);
        assert_approx_eq!(latest.value("totalActivities").unwrap(), 2.0);
    }

    #[test]
    fn median_row_over_odd_and_even_window_counts() {
        let summary = summarize(&matched(), &metrics()).unwrap();
        let median_row = summary.median("10 Year Median");
        assert_eq!(median_row.match_start, None);
        assert_eq!(median_row.label, "10 Year Median");
        assert_approx_eq!(median_row.value("totalDistanceMiles").unwrap(), 7.5);
        assert_approx_eq!(median_row.value("totalActivities").unwrap(), 2.0);

        let mut even = summary.clone();
        even.windows.pop();
        assert_approx_eq!(
            even.median("median").value("totalDistanceMiles").unwrap(),
            6.5
        );

        let rows = summary.with_median("10 Year Median");
        assert_eq!(rows.len(), 4);
        assert_eq!(rows.last().unwrap(), &median_row);
    }

    #[test]
    fn derived_metrics_are_rounded_and_part_of_the_median() {
        let metrics = vec![Metric::new("totalClimbFeet", "climbFeet", Aggregation::Sum)];
        let summary = summarize(&matched(), &metrics)
            .unwrap()
            .with_derived(&[DerivedMetric::new("hundredsOfFeet", "totalClimbFeet", 100.0)])
            .unwrap();

        // 60, 50 and 300 feet
        let derived: Vec<f64> = summary
            .windows
            .iter()
            .filter_map(|window| window.value("hundredsOfFeet"))
            .collect();
        assert_eq!(derived, vec![1.0, 0.0, 3.0]);
        assert_eq!(summary.metrics, vec!["totalClimbFeet", "hundredsOfFeet"]);
        assert_approx_eq!(
            summary.median("median").value("hundredsOfFeet").unwrap(),
            1.0
        );
    }

    #[test]
    fn hours_are_derived_from_minutes() {
        let table = Table::new(vec![
            ("durationMinutes".into(), Column::Float(vec![45.0, 45.0, 60.0])),
            (
                MATCH_START.into(),
                Column::Timestamp(vec![
                    date(2024, 10, 9).and_hms_opt(0, 0, 0).unwrap(),
                    date(2024, 10, 9).and_hms_opt(0, 0, 0).unwrap(),
                    date(2023, 10, 11).and_hms_opt(0, 0, 0).unwrap(),
                ]),
            ),
        ])
        .unwrap();
        let metrics = vec![Metric::new(
            "totalDurationMinutes",
            "durationMinutes",
            Aggregation::Sum,
        )];
        let summary = summarize(&table, &metrics)
            .unwrap()
            .with_derived(&[DerivedMetric::new(
                "totalDurationHours",
                "totalDurationMinutes",
                60.0,
            )])
            .unwrap();

        // 60 minutes and 90 minutes, the latter rounds to an even 2 hours
        assert_approx_eq!(summary.windows[0].value("totalDurationHours").unwrap(), 1.0);
        assert_approx_eq!(summary.windows[1].value("totalDurationHours").unwrap(), 2.0);
        assert_approx_eq!(
            summary
                .median("median")
                .value("totalDurationHours")
                .unwrap(),
            1.5
        );
    }

    #[test]
    fn deriving_from_unknown_metric_fails() {
        let summary = summarize(&matched(), &metrics()).unwrap();
        assert!(summary
            .with_derived(&[DerivedMetric::new("hours", "minutes", 60.0)])
            .is_err());
    }

    #[test]
    fn every_month_is_summarized() {
        let table = Table::new(vec![
            (
                "start".into(),
                Column::Text(vec![
                    "2023-12-31T10:00:00".into(),
                    "2024-01-05T10:00:00".into(),
                    "2024-01-20T10:00:00".into(),
                    "2024-03-01T10:00:00".into(),
                ]),
            ),
            ("distanceMiles".into(), Column::Float(vec![50.0, 2.0, 3.0, 4.0])),
        ])
        .unwrap();
        let metrics = vec![
            Metric::new("totalDistanceMiles", "distanceMiles", Aggregation::Sum),
            Metric::new("totalActivities", "distanceMiles", Aggregation::Count),
        ];
        let months =
            summarize_months(&table, "start", &metrics, date(2024, 1, 1), date(2024, 4, 30))
                .unwrap();

        let labels: Vec<&str> = months
            .windows
            .iter()
            .map(|month| month.label.as_str())
            .collect();
        assert_eq!(labels, vec!["2024-01", "2024-02", "2024-03", "2024-04"]);
        assert_approx_eq!(months.windows[0].value("totalDistanceMiles").unwrap(), 5.0);
        assert_approx_eq!(months.windows[0].value("totalActivities").unwrap(), 2.0);
        assert!(months.windows[1].value("totalDistanceMiles").unwrap().is_nan());
        assert_approx_eq!(months.windows[2].value("totalDistanceMiles").unwrap(), 4.0);
        assert_eq!(months.windows[3].match_start, Some(date(2024, 4, 1)));
    }

    #[test]
    fn no_months_if_first_is_after_last() {
        let months = summarize_months(
            &matched(),
            "start",
            &metrics(),
            date(2025, 1, 1),
            date(2024, 12, 31),
        )
        .unwrap();
        assert!(months.windows.is_empty());
    }

    #[test]
    fn summing_text_is_an_error() {
        let metrics = vec![Metric::new("folders", "folder", Aggregation::Sum)];
        assert!(summarize(&matched(), &metrics).is_err());
    }

    #[test]
    fn unmatched_tables_need_match_columns() {
        let table = Table::new(vec![("start".into(), Column::Int(vec![1]))]).unwrap();
        assert!(matches!(
            summarize(&table, &metrics()),
            Err(AwError::MissingColumn(_))
        ));
    }

    #[test]
    fn median_of_nothing_is_nan() {
        let summary = Summary {
            metrics: vec!["totalDistanceMiles".into()],
            windows: Vec::new(),
        };
        assert!(summary
            .median("median")
            .value("totalDistanceMiles")
            .unwrap()
            .is_nan());
    }

    proptest! {
        #[test]
        fn counts_add_up_to_matched_rows(table in activity_table(64)) {
            let ranges: Vec<(Value, Value)> = vec![
                (Value::from("2007-01-01"), Value::from("2012-12-31")),
                (Value::from("2013-01-01"), Value::from("2021-12-31")),
            ];
            let matched = filter_in_ranges(&table, "start", &ranges).unwrap().into_table();
            let metrics = vec![Metric::new("activities", "distanceMiles", Aggregation::Count)];
            let summary = summarize(&matched, &metrics).unwrap();

            let total: f64 = summary
                .windows
                .iter()
                .filter_map(|window| window.value("activities"))
                .sum();
            prop_assert_eq!(total as usize, matched.len());
            prop_assert_eq!(matched.len(), table.len());
            prop_assert!(summary.windows.len() <= ranges.len());
        }
    }
}
