//! This module contains the in-memory, column oriented table the activity records are kept in.
//! A [Table] is a list of uniquely named [Column]s of equal length. Tables are never mutated in
//! place by the rest of the workspace; every transformation builds a new table.
use crate::{AwError, AwResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use derive_more::From;
use serde_json::{Map, Number};
use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::io::{Read, Write};

/// The format used for dates in text form.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// The format used when timestamps are written as text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A single, dynamically typed cell of a [Table].
/// This is also the type range bounds are passed around as.
#[derive(Clone, Debug, PartialEq, From)]
#[allow(missing_docs)]
pub enum Value {
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Float(f64),
    Int(i64),
}

impl<'a> From<&'a str> for Value {
    fn from(other: &'a str) -> Self {
        Value::Text(other.to_string())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => text.fmt(f),
            Value::Date(date) => date.format(DATE_FORMAT).fmt(f),
            Value::Timestamp(timestamp) => timestamp.format(TIMESTAMP_FORMAT).fmt(f),
            Value::Float(float) => float.fmt(f),
            Value::Int(int) => int.fmt(f),
        }
    }
}

/// A homogeneous column of a [Table].
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum Column {
    Text(Vec<String>),
    Date(Vec<NaiveDate>),
    Timestamp(Vec<NaiveDateTime>),
    Float(Vec<f64>),
    Int(Vec<i64>),
}

impl Column {
    /// The number of values in this column.
    pub fn len(&self) -> usize {
        match self {
            Column::Text(values) => values.len(),
            Column::Date(values) => values.len(),
            Column::Timestamp(values) => values.len(),
            Column::Float(values) => values.len(),
            Column::Int(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A short name of the type of the column, used in log and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Text(_) => "text",
            Column::Date(_) => "date",
            Column::Timestamp(_) => "timestamp",
            Column::Float(_) => "float",
            Column::Int(_) => "int",
        }
    }

    /// Returns the value at `row` or None if the row is out of bounds.
    pub fn value(&self, row: usize) -> Option<Value> {
        match self {
            Column::Text(values) => values.get(row).cloned().map(Value::Text),
            Column::Date(values) => values.get(row).copied().map(Value::Date),
            Column::Timestamp(values) => values.get(row).copied().map(Value::Timestamp),
            Column::Float(values) => values.get(row).copied().map(Value::Float),
            Column::Int(values) => values.get(row).copied().map(Value::Int),
        }
    }

    /// Returns the value at `row` as a float, if the column is numeric.
    pub fn as_f64(&self, row: usize) -> Option<f64> {
        match self {
            Column::Float(values) => values.get(row).copied(),
            Column::Int(values) => values.get(row).map(|&value| value as f64),
            _ => None,
        }
    }

    /// Builds a new column which contains the values at the given rows in the given order.
    /// # Panics
    /// If a row is out of bounds.
    pub fn take(&self, rows: &[usize]) -> Column {
        fn pick<T: Clone>(values: &[T], rows: &[usize]) -> Vec<T> {
            rows.iter().map(|&row| values[row].clone()).collect()
        }

        match self {
            Column::Text(values) => Column::Text(pick(values, rows)),
            Column::Date(values) => Column::Date(pick(values, rows)),
            Column::Timestamp(values) => Column::Timestamp(pick(values, rows)),
            Column::Float(values) => Column::Float(pick(values, rows)),
            Column::Int(values) => Column::Int(pick(values, rows)),
        }
    }

    fn to_json(&self, row: usize) -> serde_json::Value {
        match self {
            Column::Text(values) => serde_json::Value::String(values[row].clone()),
            Column::Date(values) => {
                serde_json::Value::String(values[row].format(DATE_FORMAT).to_string())
            }
            Column::Timestamp(values) => {
                serde_json::Value::String(values[row].format(TIMESTAMP_FORMAT).to_string())
            }
            Column::Float(values) => Number::from_f64(values[row])
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Column::Int(values) => serde_json::Value::Number(values[row].into()),
        }
    }

    /// Infers the type of a column of raw text cells, e.g. from a csv file.
    /// Columns where every cell is an integer become [Column::Int], columns where every cell is a
    /// float become [Column::Float], all others stay [Column::Text].
    fn infer_from_text(cells: Vec<String>) -> Column {
        if !cells.is_empty() && cells.iter().all(|cell| cell.parse::<i64>().is_ok()) {
            return Column::Int(cells.iter().filter_map(|cell| cell.parse().ok()).collect());
        }
        if !cells.is_empty() && cells.iter().all(|cell| cell.parse::<f64>().is_ok()) {
            return Column::Float(cells.iter().filter_map(|cell| cell.parse().ok()).collect());
        }
        Column::Text(cells)
    }

    /// Builds a column from json cells.
    /// The type is decided by the non-null cells: strings give text, integers give ints, other
    /// numbers give floats. Nulls become `NaN` in numeric columns and empty strings in text columns.
    fn from_json(name: &str, cells: Vec<serde_json::Value>) -> AwResult<Column> {
        let non_null = || cells.iter().filter(|cell| !cell.is_null());

        if non_null().all(|cell| cell.is_i64()) && non_null().count() > 0 {
            if cells.iter().any(|cell| cell.is_null()) {
                return Ok(Column::Float(
                    cells
                        .iter()
                        .map(|cell| cell.as_f64().unwrap_or(f64::NAN))
                        .collect(),
                ));
            }
            return Ok(Column::Int(cells.iter().filter_map(|cell| cell.as_i64()).collect()));
        }

        if non_null().all(|cell| cell.is_number()) && non_null().count() > 0 {
            return Ok(Column::Float(
                cells
                    .iter()
                    .map(|cell| cell.as_f64().unwrap_or(f64::NAN))
                    .collect(),
            ));
        }

        cells
            .into_iter()
            .enumerate()
            .map(|(row, cell)| match cell {
                serde_json::Value::Null => Ok(String::new()),
                serde_json::Value::String(text) => Ok(text),
                serde_json::Value::Bool(flag) => Ok(flag.to_string()),
                serde_json::Value::Number(number) => Ok(number.to_string()),
                other => Err(AwError::StringAwError(format!(
                    "Nested value {} in column {} at row {} is not supported",
                    other, name, row
                ))),
            })
            .collect::<AwResult<Vec<_>>>()
            .map(Column::Text)
    }
}

/// An ordered collection of uniquely named columns of equal length.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Table {
    columns: Vec<(String, Column)>,
    len: usize,
}

impl Table {
    /// Creates a new table.
    /// # Returns
    /// - An `Err` if two columns share a name or the columns differ in length.
    pub fn new(columns: Vec<(String, Column)>) -> AwResult<Self> {
        let len = columns.first().map(|(_, column)| column.len()).unwrap_or(0);
        let mut table = Table {
            columns: Vec::with_capacity(columns.len()),
            len,
        };
        for (name, column) in columns {
            table.push_column(name, column)?;
        }
        Ok(table)
    }

    fn push_column(&mut self, name: String, column: Column) -> AwResult<()> {
        if self.columns.iter().any(|(existing, _)| *existing == name) {
            return Err(AwError::DuplicateColumn(name));
        }
        if self.columns.is_empty() {
            self.len = column.len();
        } else if column.len() != self.len {
            return Err(AwError::ColumnLengthMismatch {
                column: name,
                expected: self.len,
                actual: column.len(),
            });
        }
        self.columns.push((name, column));
        Ok(())
    }

    /// The number of rows.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The names of all columns in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// All columns together with their names.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns
            .iter()
            .map(|(name, column)| (name.as_str(), column))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(existing, _)| existing == name)
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> AwResult<&Column> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, column)| column)
            .ok_or_else(|| AwError::MissingColumn(name.to_string()))
    }

    /// Returns the table extended by a new column at the end.
    pub fn with_column(mut self, name: &str, column: Column) -> AwResult<Self> {
        self.push_column(name.to_string(), column)?;
        Ok(self)
    }

    /// Returns the table where the column `name` has been replaced.
    pub fn replace_column(mut self, name: &str, column: Column) -> AwResult<Self> {
        if column.len() != self.len {
            return Err(AwError::ColumnLengthMismatch {
                column: name.to_string(),
                expected: self.len,
                actual: column.len(),
            });
        }
        let slot = self
            .columns
            .iter_mut()
            .find(|(existing, _)| existing == name)
            .ok_or_else(|| AwError::MissingColumn(name.to_string()))?;
        slot.1 = column;
        Ok(self)
    }

    /// Builds a new table containing only the given rows, in the given order.
    /// # Panics
    /// If a row is out of bounds.
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), column.take(rows)))
                .collect(),
            len: rows.len(),
        }
    }

    /// Returns all values of one row in column order.
    pub fn row(&self, row: usize) -> Option<Vec<Value>> {
        self.columns
            .iter()
            .map(|(_, column)| column.value(row))
            .collect()
    }

    /// Keeps the rows where the text column `name` equals `expected`.
    pub fn filter_text_eq(&self, name: &str, expected: &str) -> AwResult<Table> {
        let rows: Vec<usize> = match self.column(name)? {
            Column::Text(values) => values
                .iter()
                .enumerate()
                .filter(|(_, value)| *value == expected)
                .map(|(row, _)| row)
                .collect(),
            other => {
                return Err(AwError::StringAwError(format!(
                    "Can only compare text columns, but {} is a {} column",
                    name,
                    other.type_name()
                )))
            }
        };
        Ok(self.take_rows(&rows))
    }

    /// Converts the text column `name` into a timestamp column.
    /// Columns which already hold timestamps are left alone, date columns become midnight
    /// timestamps.
    pub fn parse_timestamps(self, name: &str) -> AwResult<Self> {
        let parsed = match self.column(name)? {
            Column::Timestamp(_) => return Ok(self),
            Column::Date(values) => values.iter().copied().map(midnight).collect(),
            Column::Text(values) => values
                .iter()
                .enumerate()
                .map(|(row, value)| {
                    parse_date_time(value).ok_or_else(|| AwError::UnparseableColumnValue {
                        column: name.to_string(),
                        row,
                        value: value.clone(),
                    })
                })
                .collect::<AwResult<Vec<_>>>()?,
            other => {
                return Err(AwError::UnparseableColumnValue {
                    column: name.to_string(),
                    row: 0,
                    value: format!("<{} column>", other.type_name()),
                })
            }
        };
        self.replace_column(name, Column::Timestamp(parsed))
    }

    /// Converts the column `name` into a float column.
    pub fn parse_floats(self, name: &str) -> AwResult<Self> {
        let parsed = match self.column(name)? {
            Column::Float(_) => return Ok(self),
            Column::Int(values) => values.iter().map(|&value| value as f64).collect(),
            Column::Text(values) => values
                .iter()
                .map(|value| value.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(AwError::StringAwError(format!(
                    "Can not convert {} column {} to floats",
                    other.type_name(),
                    name
                )))
            }
        };
        self.replace_column(name, Column::Float(parsed))
    }

    /// Returns the table extended by the float column `name` holding the minutes from `start`
    /// to `end` of each row, rounded to whole minutes with ties to even.
    /// Both columns are converted to timestamps first, see [Table::parse_timestamps].
    pub fn with_duration_minutes(self, start: &str, end: &str, name: &str) -> AwResult<Self> {
        let table = self.parse_timestamps(start)?.parse_timestamps(end)?;
        let minutes = match (table.column(start)?, table.column(end)?) {
            (Column::Timestamp(starts), Column::Timestamp(ends)) => starts
                .iter()
                .zip(ends.iter())
                .map(|(start, end)| {
                    ((*end - *start).num_seconds() as f64 / 60.0).round_ties_even()
                })
                .collect(),
            _ => {
                return Err(AwError::StringAwError(format!(
                    "Expected {} and {} to be timestamp columns",
                    start, end
                )))
            }
        };
        table.with_column(name, Column::Float(minutes))
    }

    /// Reads a table from a json array of flat objects, one object per row.
    /// Columns are the union of all keys; missing keys are treated like `null`.
    pub fn read_json_records<R: Read>(reader: R) -> AwResult<Self> {
        let records: Vec<Map<String, serde_json::Value>> = serde_json::from_reader(reader)?;

        let mut names = Vec::new();
        let mut seen = BTreeSet::new();
        for record in &records {
            for key in record.keys() {
                if seen.insert(key.clone()) {
                    names.push(key.clone());
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let cells = records
                    .iter()
                    .map(|record| record.get(&name).cloned().unwrap_or(serde_json::Value::Null))
                    .collect();
                let column = Column::from_json(&name, cells)?;
                Ok((name, column))
            })
            .collect::<AwResult<Vec<_>>>()?;

        log::debug!(
            "Read {} records with {} columns from json",
            records.len(),
            columns.len()
        );
        Table::new(columns)
    }

    /// Reads a table from csv with a header row. Column types are inferred, see
    /// [Column::infer_from_text].
    pub fn read_csv<R: Read>(reader: R) -> AwResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let names: Vec<String> = csv_reader.headers()?.iter().map(String::from).collect();

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        for record in csv_reader.records() {
            let record = record?;
            for (column, cell) in cells.iter_mut().zip(record.iter()) {
                column.push(cell.to_string());
            }
        }

        Table::new(
            names
                .into_iter()
                .zip(cells.into_iter().map(Column::infer_from_text))
                .collect(),
        )
    }

    /// Writes the table as csv with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> AwResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.column_names())?;
        for row in 0..self.len {
            csv_writer.write_record(
                self.columns
                    .iter()
                    .filter_map(|(_, column)| column.value(row))
                    .map(|value| value.to_string()),
            )?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Converts the table to a json array of objects, one object per row.
    pub fn to_json_records(&self) -> serde_json::Value {
        serde_json::Value::Array(
            (0..self.len)
                .map(|row| {
                    serde_json::Value::Object(
                        self.columns
                            .iter()
                            .map(|(name, column)| (name.clone(), column.to_json(row)))
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}

/// The first instant of `date`.
pub fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Parses a strict `YYYY-MM-DD` date. Shorter forms like `2024-1-5` are rejected, as they would not
/// order correctly when compared as text.
pub fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let bytes = text.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, byte)| match i {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        });
    if !well_formed {
        return None;
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

/// Parses the date-like text found in activity data into a timestamp.
/// Accepts plain dates (midnight), `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DDTHH:MM:SS` with optional
/// fractional seconds, and RFC 3339 timestamps. The offset of the latter is dropped, the local time
/// as written is kept.
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Some(date) = parse_iso_date(text) {
        return Some(midnight(date));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|with_offset| with_offset.naive_local())
        })
}
