//! Summary statistics of the current dataset.

use crate::cell::CellValue;
use crate::error::{PlotError, PlotResult};
use crate::frame;
use crate::table::{INDEX_COLUMN, TableSnapshot};
use polars::prelude::{ChunkAgg, ChunkQuantile, ChunkVar, QuantileMethod};
use serde::Serialize;
use std::collections::HashMap;

/// Columns with at most this many distinct values list their most frequent
/// values.
pub const LOW_CARDINALITY: usize = 20;

/// Descriptive statistics of one numeric column, rounded to 2 decimals
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; undefined below two values.
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColumnSummary {
    pub column: String,
    pub dtype: String,
    pub nulls: usize,
    pub unique: usize,
    /// Most frequent values, only for low-cardinality columns.
    pub top: Vec<ValueCount>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Summary {
    pub rows: usize,
    pub numeric: Vec<NumericSummary>,
    pub columns: Vec<ColumnSummary>,
}

/// Summarize every column except `Index`.
///
/// # Arguments
/// * `table` - The current dataset
/// * `top_n` - How many frequent values to list per low-cardinality column
///
/// # Errors
/// * `EmptyDataset` if there are no rows
/// * `Processing` if a statistic is not finite (e.g. infinities in the data)
pub fn describe(table: &TableSnapshot, top_n: usize) -> PlotResult<Summary> {
    if table.is_empty() {
        return Err(PlotError::EmptyDataset);
    }

    let mut numeric = Vec::new();
    let mut columns = Vec::new();

    for (c, column) in table.columns.iter().enumerate() {
        if column.name == INDEX_COLUMN {
            continue;
        }
        let values: Vec<&CellValue> = table.rows.iter().map(|row| &row[c]).collect();

        if column.dtype.is_numeric() {
            if let Some(summary) = numeric_summary(&column.name, &values)? {
                numeric.push(summary);
            }
        }

        let series = frame::column_series(table, c);
        columns.push(ColumnSummary {
            column: column.name.clone(),
            dtype: column.dtype.label().to_string(),
            nulls: series.null_count(),
            unique: frame::distinct_count(&series)?,
            top: top_values(&values, top_n),
        });
    }

    Ok(Summary {
        rows: table.row_count(),
        numeric,
        columns,
    })
}

fn numeric_summary(column: &str, values: &[&CellValue]) -> PlotResult<Option<NumericSummary>> {
    let numbers = frame::numbers(column, values);
    let count = numbers.len() - numbers.null_count();
    if count == 0 {
        return Ok(None);
    }
    let quantile = |q: f64| -> PlotResult<f64> {
        Ok(numbers
            .quantile(q, QuantileMethod::Linear)?
            .unwrap_or(f64::NAN))
    };

    let summary = NumericSummary {
        column: column.to_string(),
        count,
        mean: round2(numbers.mean().unwrap_or(f64::NAN)),
        std: if count > 1 { numbers.std(1).map(round2) } else { None },
        min: round2(numbers.min().unwrap_or(f64::NAN)),
        q25: round2(quantile(0.25)?),
        q50: round2(quantile(0.5)?),
        q75: round2(quantile(0.75)?),
        max: round2(numbers.max().unwrap_or(f64::NAN)),
    };

    let stats = [
        summary.mean,
        summary.min,
        summary.q25,
        summary.q50,
        summary.q75,
        summary.max,
        summary.std.unwrap_or(0.0),
    ];
    if stats.iter().any(|s| !s.is_finite()) {
        return Err(PlotError::Processing(format!(
            "column '{}' has non-finite statistics",
            column
        )));
    }
    Ok(Some(summary))
}

/// Most frequent values of a low-cardinality column, ties in first-appearance
/// order. Empty when every cell holds a distinct value or there are too many.
fn top_values(values: &[&CellValue], top_n: usize) -> Vec<ValueCount> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in values.iter().filter(|v| !v.is_null()) {
        let key = value.display();
        let count = counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            order.push(key);
        }
        *count += 1;
    }

    if order.len() > LOW_CARDINALITY || order.len() >= values.len() {
        return Vec::new();
    }
    let mut ranked: Vec<ValueCount> = order
        .into_iter()
        .map(|value| {
            let count = counts[&value];
            ValueCount { value, count }
        })
        .collect();
    // stable: ties keep first-appearance order
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(top_n);
    ranked
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
