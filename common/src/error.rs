use std::{error::Error, fmt::Display};

/// This type gets used to be our catch all error.
/// The domain failures of window generation and range matching have their own variants so callers
/// can react to them; all library errors get converted to [AwError::OtherAwError].
#[derive(Debug)]
pub enum AwError {
    /// The bounds of a range list are neither all `YYYY-MM-DD` strings nor all plain dates.
    UnsupportedBoundType {
        /// Debug rendering of the first bound that broke the classification.
        value: String,
    },
    /// A column value could not be converted to a date.
    UnparseableColumnValue {
        /// Name of the column that was scanned.
        column: String,
        /// Row index of the value.
        row: usize,
        /// The offending value as it appeared in the column.
        value: String,
    },
    /// A week or year count outside of what the window operation accepts.
    InvalidWindowParameters {
        /// Name of the rejected parameter.
        parameter: &'static str,
        /// The rejected value.
        value: i64,
    },
    /// Date arithmetic left the range chrono can represent.
    DateOutOfRange,
    /// The table has no column of that name.
    MissingColumn(String),
    /// A column of that name already exists.
    DuplicateColumn(String),
    /// A column's length differs from the table's row count.
    ColumnLengthMismatch {
        /// Name of the column.
        column: String,
        /// Row count of the table.
        expected: usize,
        /// Length of the column.
        actual: usize,
    },
    /// Allows a generic Error message.
    StringAwError(String),
    /// Anticipated errors, may be rethrown with an additional error message
    RethrowAwError(String, Box<dyn Error>),
    /// All other library Errors get converted to this error.
    OtherAwError(Box<dyn Error>),
}

/// This type is our goto Result, as it allows us to convert between many different errors.
pub type AwResult<O> = Result<O, AwError>;

impl Display for AwError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AwError::UnsupportedBoundType { value } => write!(
                f,
                "Unsupported range bound {}. Provide ranges as either strings 'YYYY-MM-DD' or plain dates, never mixed.",
                value
            ),
            AwError::UnparseableColumnValue { column, row, value } => write!(
                f,
                "Could not parse value {:?} in column {} at row {} as a date",
                value, column, row
            ),
            AwError::InvalidWindowParameters { parameter, value } => {
                write!(f, "Invalid window parameter {} = {}", parameter, value)
            }
            AwError::DateOutOfRange => "Date arithmetic left the supported date range".fmt(f),
            AwError::MissingColumn(name) => write!(f, "Table has no column {}", name),
            AwError::DuplicateColumn(name) => write!(f, "Table already has a column {}", name),
            AwError::ColumnLengthMismatch {
                column,
                expected,
                actual,
            } => write!(
                f,
                "Column {} has {} values but the table has {} rows",
                column, actual, expected
            ),
            AwError::StringAwError(str) => str.fmt(f),
            AwError::RethrowAwError(str, err) => {
                str.fmt(f)?;
                " with: ".fmt(f)?;
                err.fmt(f)?;
                Ok(())
            }
            AwError::OtherAwError(err) => err.fmt(f),
        }
    }
}
impl Error for AwError {}

impl AwError {
    /// Allows to annotate an AwError to better detect the origin of errors.
    /// # Usage
    /// ```
    /// # use common::{AwError, AwResult};
    /// # fn fallible_function() -> AwResult<()> {
    /// # Err(AwError::StringAwError("".into()))
    /// # }
    /// # fn container_function() -> AwResult<()> {
    /// fallible_function().map_err(AwError::rethrow_with("function failed"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn rethrow_with(str: &'static str) -> impl Fn(AwError) -> AwError {
        move |err| AwError::RethrowAwError(str.to_string(), Box::new(err))
    }
}

macro_rules! implement_from {
    ($type:ty) => {
        impl From<$type> for AwError {
            fn from(other: $type) -> Self {
                AwError::OtherAwError(Box::from(other))
            }
        }
    };
}
implement_from!(std::io::Error);
implement_from!(serde_json::Error);
implement_from!(csv::Error);
implement_from!(std::num::ParseFloatError);
implement_from!(chrono::ParseError);
implement_from!(serde_dhall::Error);
implement_from!(flexi_logger::FlexiLoggerError);

impl<'a> From<&'a str> for AwError {
    fn from(other: &'a str) -> Self {
        AwError::StringAwError(other.to_string())
    }
}
impl From<String> for AwError {
    fn from(other: String) -> Self {
        AwError::StringAwError(other)
    }
}
