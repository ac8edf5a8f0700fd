//! This crate contains helper functions that are used exclusively in defining binaries, that is
//! main functions.
use chrono::{Datelike, Local, NaiveDate};
use common::{table::parse_iso_date, AwError, AwResult, Column, Table, Value};
use date_windows::{BoundRepresentation, PreviousWeeks, WindowRequest};
use range_matching::{filter_in_ranges, MatchedTable};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use summaries::{
    summarize, summarize_months, Aggregation, DerivedMetric, Metric, Summary, WindowSummary,
};

/// Name of the column holding the duration of each activity, if an end column is configured.
pub const DURATION_MINUTES: &str = "durationMinutes";

/// Only rows whose `column` equals `equals` are considered.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ColumnFilter {
    pub column: String,
    pub equals: String,
}

/// Must always match config/activity_windows.dhall
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ActivityWindowsConfig {
    /// The column holding the date of each activity.
    pub date_column: String,
    /// The column holding the end of each activity. If given, [DURATION_MINUTES] is derived from
    /// it and can be used in metrics.
    pub end_column: Option<String>,
    pub activity_filter: Option<ColumnFilter>,
    pub windows: WindowRequest,
    /// Whether the ranges are passed to the matcher as strings or dates.
    pub bounds: BoundRepresentation,
    pub metrics: Vec<Metric>,
    pub derived_metrics: Vec<DerivedMetric>,
    /// Whether to also summarize every month from the first full year of data up to the end of
    /// the reference year.
    pub monthly: bool,
    /// Label of the median row appended to the summary.
    pub median_label: String,
}

impl Default for ActivityWindowsConfig {
    fn default() -> Self {
        Self {
            date_column: "start".into(),
            end_column: Some("end".into()),
            activity_filter: Some(ColumnFilter {
                column: "activityType".into(),
                equals: "On Foot".into(),
            }),
            windows: WindowRequest::Previous(PreviousWeeks {
                weeks_back: 4,
                years_back: 10,
            }),
            bounds: BoundRepresentation::Text,
            metrics: vec![
                Metric::new("totalDistanceMiles", "distanceMiles", Aggregation::Sum),
                Metric::new("totalActivities", "folder", Aggregation::Count),
                Metric::new("totalDurationMinutes", DURATION_MINUTES, Aggregation::Sum),
                Metric::new("totalClimbFeet", "climbFeet", Aggregation::Sum),
            ],
            derived_metrics: vec![DerivedMetric::new(
                "totalDurationHours",
                "totalDurationMinutes",
                60.0,
            )],
            monthly: true,
            median_label: "10 Year Median".into(),
        }
    }
}

impl ActivityWindowsConfig {
    /// Config from dhall file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AwResult<Self> {
        Ok(serde_dhall::from_file(path).parse::<ActivityWindowsConfig>()?)
    }
}

/// Everything one run over an activity table produces.
#[derive(Clone, Debug)]
pub struct Report {
    pub reference_date: NaiveDate,
    /// The ranges the table was matched against, most recent first.
    pub ranges: Vec<(Value, Value)>,
    pub matched: MatchedTable,
    pub summary: Summary,
    pub median: WindowSummary,
    /// One row per month, if requested.
    pub months: Option<Summary>,
}

/// The json document written for a [Report].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryOutput<'r> {
    pub reference_date: NaiveDate,
    pub matched_rows: usize,
    pub windows: &'r [WindowSummary],
    pub median: &'r WindowSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub months: Option<&'r [WindowSummary]>,
}

impl Report {
    /// The json representation of the summary part of this report.
    pub fn summary_output(&self) -> SummaryOutput<'_> {
        SummaryOutput {
            reference_date: self.reference_date,
            matched_rows: self.matched.len(),
            windows: &self.summary.windows,
            median: &self.median,
            months: self.months.as_ref().map(|months| months.windows.as_slice()),
        }
    }
}

/// Reads the date given on the command line, or today if there is none.
pub fn reference_date(argument: Option<&str>) -> AwResult<NaiveDate> {
    match argument {
        Some(text) => parse_iso_date(text).ok_or_else(|| {
            AwError::StringAwError(format!(
                "Could not read reference date {}. Enter in YYYY-MM-DD format.",
                text
            ))
        }),
        None => Ok(Local::now().date_naive()),
    }
}

/// Reads an activity table from a `.json` file holding an array of records or a `.csv` file.
pub fn read_table<P: AsRef<Path>>(path: P) -> AwResult<Table> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    match path.extension().and_then(|extension| extension.to_str()) {
        Some("json") => Table::read_json_records(reader),
        Some("csv") => Table::read_csv(reader),
        _ => Err(AwError::StringAwError(format!(
            "Don't know how to read {}, expected a .json or .csv file",
            path.display()
        ))),
    }
    .map_err(AwError::rethrow_with("Could not read activity table"))
}

/// Filters, matches and summarizes an activity table as described by `config`.
pub fn run(
    config: &ActivityWindowsConfig,
    activities: Table,
    reference_date: NaiveDate,
) -> AwResult<Report> {
    let activities = match &config.activity_filter {
        Some(filter) => {
            let filtered = activities.filter_text_eq(&filter.column, &filter.equals)?;
            log::info!(
                "{} of {} activities have {} = {}",
                filtered.len(),
                activities.len(),
                filter.column,
                filter.equals
            );
            filtered
        }
        None => activities,
    };
    let activities = activities.parse_timestamps(&config.date_column)?;
    let activities = match &config.end_column {
        Some(end_column) => {
            activities.with_duration_minutes(&config.date_column, end_column, DURATION_MINUTES)?
        }
        None => activities,
    };

    let ranges = config.windows.ranges(reference_date, config.bounds)?;
    let matched = filter_in_ranges(&activities, &config.date_column, &ranges)?;
    log::info!(
        "{} activities fall into {} windows",
        matched.len(),
        ranges.len()
    );

    let summary =
        summarize(&matched.table, &config.metrics)?.with_derived(&config.derived_metrics)?;
    let median = summary.median(&config.median_label);
    let months = if config.monthly {
        Some(monthly_summary(config, &activities, reference_date)?)
    } else {
        None
    };

    Ok(Report {
        reference_date,
        ranges,
        matched,
        summary,
        median,
        months,
    })
}

/// Summarizes every month from January of the first full year of activities to December of the
/// reference year.
fn monthly_summary(
    config: &ActivityWindowsConfig,
    activities: &Table,
    reference_date: NaiveDate,
) -> AwResult<Summary> {
    let first_year = match activities.column(&config.date_column)? {
        Column::Timestamp(starts) => starts.iter().map(|start| start.year()).min(),
        _ => None,
    };
    let (first, last) = match first_year.and_then(|year| {
        Some((
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?,
            NaiveDate::from_ymd_opt(reference_date.year(), 12, 31)?,
        ))
    }) {
        Some(months) => months,
        None => {
            return Ok(Summary {
                metrics: Vec::new(),
                windows: Vec::new(),
            })
        }
    };
    summarize_months(activities, &config.date_column, &config.metrics, first, last)?
        .with_derived(&config.derived_metrics)
}
