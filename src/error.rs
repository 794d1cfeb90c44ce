//! Error taxonomy shared by the store, the mutation operations and the chart
//! builders.
//!
//! Variants above the divider are expected outcomes of user input and are shown
//! to the user as a notice; variants below it are infrastructure failures.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type PlotResult<T> = Result<T, PlotError>;

#[derive(Debug, Error)]
pub enum PlotError {
    /// The current dataset has no rows to act on
    #[error("No data available. Upload a CSV file first.")]
    EmptyDataset,

    /// Malformed upload
    #[error("Invalid file: {0}")]
    InvalidFormat(String),

    /// Unparsable identifier or value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Row with Index '{0}' not found")]
    RowNotFound(String),

    /// Value incompatible with the column's inferred type
    #[error("Cannot store '{value}' in column '{column}' of type {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        value: String,
    },

    /// Replace requested but the owner has no current file
    #[error("No stored file to update")]
    FileNotFound,

    /// Unexpected failure while describing or plotting
    #[error("Error processing data: {0}")]
    Processing(String),

    #[error("Could not save plot: {0}")]
    Save(String),

    #[error("Please log in first")]
    Unauthorized,

    // ---- infrastructure ----
    #[error("database error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("csv error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    #[error("dataframe error: {source}")]
    Frame {
        #[from]
        source: polars::prelude::PolarsError,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),
}

impl PlotError {
    /// Whether the error belongs to the user-facing taxonomy, i.e. it should be
    /// reported as a notice and the request completed normally.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            PlotError::EmptyDataset
                | PlotError::InvalidFormat(_)
                | PlotError::InvalidInput(_)
                | PlotError::ColumnNotFound(_)
                | PlotError::RowNotFound(_)
                | PlotError::TypeMismatch { .. }
                | PlotError::FileNotFound
                | PlotError::Processing(_)
                | PlotError::Save(_)
                | PlotError::Unauthorized
        )
    }
}

impl From<serde_json::Error> for PlotError {
    fn from(e: serde_json::Error) -> Self {
        PlotError::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for PlotError {
    fn from(e: bincode::Error) -> Self {
        PlotError::Serialization(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for PlotError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        PlotError::Serialization(e.to_string())
    }
}

impl<E: std::error::Error + Send + Sync> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for PlotError
{
    fn from(e: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        PlotError::Processing(e.to_string())
    }
}
