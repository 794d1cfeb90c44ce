//! Polars views of snapshot columns.
//!
//! The snapshot stays the stored and edited form of a dataset. Work that
//! spans a whole column (null masks, distinct counts, descriptive statistics)
//! runs on the series built here.

use crate::cell::{CellValue, DType};
use crate::error::PlotResult;
use crate::table::TableSnapshot;
use polars::prelude::*;

/// Column `col` of `table` as a typed series.
///
/// A column whose cells do not all fit its type (e.g. after a replace mixed
/// kinds) becomes a string series of the displayed values. Nulls stay nulls.
pub fn column_series(table: &TableSnapshot, col: usize) -> Series {
    let column = &table.columns[col];
    let name: PlSmallStr = column.name.as_str().into();
    let cells: Vec<&CellValue> = table.rows.iter().map(|row| &row[col]).collect();

    let fits = |check: fn(&CellValue) -> bool| cells.iter().all(|v| v.is_null() || check(v));
    match column.dtype {
        DType::Int if fits(|v| matches!(v, CellValue::Int(_))) => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|v| match v {
                    CellValue::Int(i) => Some(*i),
                    _ => None,
                })
                .collect();
            Series::new(name, values)
        }
        DType::Float if fits(|v| matches!(v, CellValue::Int(_) | CellValue::Float(_))) => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|v| match v {
                    CellValue::Int(i) => Some(*i as f64),
                    CellValue::Float(f) => Some(*f),
                    _ => None,
                })
                .collect();
            Series::new(name, values)
        }
        DType::Bool if fits(|v| matches!(v, CellValue::Bool(_))) => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|v| match v {
                    CellValue::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            Series::new(name, values)
        }
        _ => {
            let values: Vec<Option<String>> = cells
                .iter()
                .map(|v| (!v.is_null()).then(|| v.display()))
                .collect();
            Series::new(name, values)
        }
    }
}

/// For every row, whether it holds a value in each column.
pub fn complete_rows(table: &TableSnapshot) -> Vec<bool> {
    let mut mask = BooleanChunked::full(PlSmallStr::EMPTY, true, table.row_count());
    for col in 0..table.columns.len() {
        mask = &mask & &column_series(table, col).is_not_null();
    }
    (&mask).into_iter().map(|keep| keep.unwrap_or(false)).collect()
}

/// Number of distinct non-null values of a column.
pub fn distinct_count(series: &Series) -> PlotResult<usize> {
    Ok(series.drop_nulls().n_unique()?)
}

/// Numeric values of a column as floats. NaN and non-numeric cells are null.
pub fn numbers(name: &str, values: &[&CellValue]) -> Float64Chunked {
    Float64Chunked::from_iter_options(name.into(), values.iter().map(|v| v.as_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::from_csv_bytes;

    #[test]
    fn series_follow_column_types() {
        let t = from_csv_bytes(b"i,f,b,s\n1,1.5,true,x\n,2.5,,y\n").unwrap();
        let dtypes: Vec<DataType> = (0..t.columns.len())
            .map(|c| column_series(&t, c).dtype().clone())
            .collect();
        assert_eq!(
            dtypes,
            vec![
                DataType::Int64,
                DataType::Int64,
                DataType::Float64,
                DataType::Boolean,
                DataType::String
            ]
        );
        assert_eq!(column_series(&t, 1).null_count(), 1);
        assert_eq!(column_series(&t, 3).null_count(), 1);
    }

    #[test]
    fn mixed_cells_become_text() {
        let mut t = from_csv_bytes(b"v\n1\n2\n").unwrap();
        t.rows[1][1] = CellValue::Str("two".into());
        let s = column_series(&t, 1);
        assert_eq!(s.dtype(), &DataType::String);
        assert_eq!(s.null_count(), 0);
    }

    #[test]
    fn complete_rows_mark_nulls_anywhere() {
        let t = from_csv_bytes(b"a,b\n1,x\n,y\n3,\n4,z\n").unwrap();
        assert_eq!(complete_rows(&t), vec![true, false, false, true]);
        assert!(complete_rows(&TableSnapshot::empty()).is_empty());
    }

    #[test]
    fn distinct_values_skip_nulls() {
        let t = from_csv_bytes(b"k\na\nb\nNA\na\n").unwrap();
        assert_eq!(distinct_count(&column_series(&t, 1)).unwrap(), 2);
    }
}
