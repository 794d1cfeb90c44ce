use crate::cell::{CellValue, DType};
use crate::error::{PlotError, PlotResult};
use crate::frame;
use serde::{Deserialize, Serialize};

/// Name of the synthesized row identifier column.
pub const INDEX_COLUMN: &str = "Index";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: DType,
}

/// In-memory materialization of one stored CSV file.
///
/// Rows are aligned with `columns`. Once `ensure_index` has run, the first
/// column is `Index` and its values identify rows for the lifetime of the
/// dataset; deleting a row never renumbers the survivors.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct TableSnapshot {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<CellValue>>,
}

impl TableSnapshot {
    /// The explicitly empty snapshot returned when there is no current file.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<Column>, rows: Vec<Vec<CellValue>>) -> Self {
        TableSnapshot { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn require_column(&self, name: &str) -> PlotResult<usize> {
        self.column_position(name)
            .ok_or_else(|| PlotError::ColumnNotFound(name.to_string()))
    }

    /// Values of one column in row order.
    pub fn column_values(&self, name: &str) -> PlotResult<Vec<CellValue>> {
        let pos = self.require_column(name)?;
        Ok(self.rows.iter().map(|row| row[pos].clone()).collect())
    }

    /// Insert the ordinal `Index` column in front unless it is already present.
    pub fn ensure_index(&mut self) {
        if self.column_position(INDEX_COLUMN).is_some() {
            return;
        }
        self.columns.insert(
            0,
            Column {
                name: INDEX_COLUMN.to_string(),
                dtype: DType::Int,
            },
        );
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.insert(0, CellValue::Int(i as i64));
        }
    }

    pub fn has_nulls(&self) -> bool {
        (0..self.columns.len()).any(|c| frame::column_series(self, c).null_count() > 0)
    }

    /// Drop every row containing at least one null. Returns how many rows went.
    pub fn drop_null_rows(&mut self) -> usize {
        let mut keep = frame::complete_rows(self).into_iter();
        let before = self.rows.len();
        self.rows.retain(|_| keep.next().unwrap_or(true));
        before - self.rows.len()
    }

    pub fn delete_column(&mut self, name: &str) -> PlotResult<()> {
        let pos = self.require_column(name)?;
        if name == INDEX_COLUMN {
            return Err(PlotError::InvalidInput(
                "the Index column identifies rows and cannot be deleted".to_string(),
            ));
        }
        self.columns.remove(pos);
        for row in self.rows.iter_mut() {
            row.remove(pos);
        }
        Ok(())
    }

    /// Locate the first row whose Index equals `index_text`, parsed with the
    /// Index column's type.
    pub fn find_row(&self, index_text: &str) -> PlotResult<usize> {
        let pos = self.require_column(INDEX_COLUMN)?;
        let dtype = self.columns[pos].dtype;
        let wanted = match CellValue::coerce(index_text, dtype) {
            Some(v) if !v.is_null() && DType::from_values([&v]) == dtype => v,
            _ => {
                return Err(PlotError::InvalidInput(format!(
                    "'{}' is not a valid row index",
                    index_text.trim()
                )));
            }
        };
        self.rows
            .iter()
            .position(|row| row[pos].matches(&wanted))
            .ok_or_else(|| PlotError::RowNotFound(index_text.trim().to_string()))
    }

    pub fn delete_row(&mut self, index_text: &str) -> PlotResult<()> {
        let row = self.find_row(index_text)?;
        self.rows.remove(row);
        Ok(())
    }

    /// Set exactly one cell, coercing `new_value` to the column's type.
    pub fn edit_cell(&mut self, column: &str, index_text: &str, new_value: &str) -> PlotResult<()> {
        let col = self.require_column(column)?;
        if column == INDEX_COLUMN {
            return Err(PlotError::InvalidInput(
                "the Index column is read-only".to_string(),
            ));
        }
        let row = self.find_row(index_text)?;
        let dtype = self.columns[col].dtype;
        let value =
            CellValue::coerce(new_value, dtype).ok_or_else(|| PlotError::TypeMismatch {
                column: column.to_string(),
                expected: dtype.label().to_string(),
                value: new_value.to_string(),
            })?;

        if dtype == DType::Int && matches!(value, CellValue::Float(_)) {
            self.widen_to_float(col);
        }
        self.rows[row][col] = value;
        Ok(())
    }

    fn widen_to_float(&mut self, col: usize) {
        self.columns[col].dtype = DType::Float;
        for row in self.rows.iter_mut() {
            if let CellValue::Int(i) = row[col] {
                row[col] = CellValue::Float(i as f64);
            }
        }
    }

    /// Replace every cell of `column` equal to `match_text` with `replacement`.
    ///
    /// Both texts are parsed opportunistically (boolean, integer, float,
    /// string); a replacement of `nan` stores a null. Returns the number of
    /// cells changed.
    pub fn replace_value(
        &mut self,
        column: &str,
        match_text: &str,
        replacement: &str,
    ) -> PlotResult<usize> {
        let col = self.require_column(column)?;
        if column == INDEX_COLUMN {
            return Err(PlotError::InvalidInput(
                "the Index column is read-only".to_string(),
            ));
        }
        let target = CellValue::guess(match_text);
        let new_value = if replacement.trim().eq_ignore_ascii_case("nan") {
            CellValue::Null
        } else {
            CellValue::guess(replacement)
        };

        let mut changed = 0;
        for row in self.rows.iter_mut() {
            if row[col].matches(&target) {
                row[col] = new_value.clone();
                changed += 1;
            }
        }
        if changed > 0 {
            self.columns[col].dtype = DType::from_values(self.rows.iter().map(|r| &r[col]));
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TableSnapshot {
        let mut t = TableSnapshot::new(
            vec![
                Column { name: "a".into(), dtype: DType::Int },
                Column { name: "price".into(), dtype: DType::Float },
                Column { name: "flag".into(), dtype: DType::Bool },
            ],
            vec![
                vec![CellValue::Int(1), CellValue::Float(1.5), CellValue::Bool(true)],
                vec![CellValue::Null, CellValue::Float(2.5), CellValue::Bool(true)],
                vec![CellValue::Int(3), CellValue::Null, CellValue::Bool(false)],
                vec![CellValue::Int(4), CellValue::Float(4.5), CellValue::Bool(true)],
                vec![CellValue::Int(5), CellValue::Float(5.5), CellValue::Bool(false)],
            ],
        );
        t.ensure_index();
        t
    }

    #[test]
    fn index_is_synthesized_once() {
        let mut t = sample();
        assert_eq!(t.columns[0].name, INDEX_COLUMN);
        assert_eq!(t.rows[4][0], CellValue::Int(4));
        t.ensure_index();
        assert_eq!(t.columns.len(), 4);
    }

    #[test]
    fn clean_is_idempotent() {
        let mut t = sample();
        assert!(t.has_nulls());
        assert_eq!(t.drop_null_rows(), 2);
        assert!(!t.has_nulls());
        let once = t.clone();
        assert_eq!(t.drop_null_rows(), 0);
        assert_eq!(t, once);
    }

    #[test]
    fn delete_row_keeps_other_indices() {
        let mut t = sample();
        t.delete_row("2").unwrap();
        assert_eq!(t.row_count(), 4);
        let idx: Vec<_> = t.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(
            idx,
            vec![CellValue::Int(0), CellValue::Int(1), CellValue::Int(3), CellValue::Int(4)]
        );
        assert!(matches!(t.delete_row("2"), Err(PlotError::RowNotFound(_))));
        assert!(matches!(t.delete_row("two"), Err(PlotError::InvalidInput(_))));
        assert!(matches!(t.delete_row("1.5"), Err(PlotError::InvalidInput(_))));
    }

    #[test]
    fn delete_missing_column_changes_nothing() {
        let mut t = sample();
        let before = t.clone();
        assert!(matches!(t.delete_column("nope"), Err(PlotError::ColumnNotFound(_))));
        assert_eq!(t, before);
        assert!(matches!(t.delete_column(INDEX_COLUMN), Err(PlotError::InvalidInput(_))));
        t.delete_column("price").unwrap();
        assert_eq!(t.column_names(), vec!["Index", "a", "flag"]);
        assert!(t.rows.iter().all(|r| r.len() == 3));
    }

    #[test]
    fn edit_cell_rejects_text_in_float_column() {
        let mut t = sample();
        let before = t.clone();
        let err = t.edit_cell("price", "0", "abc").unwrap_err();
        assert!(matches!(err, PlotError::TypeMismatch { .. }));
        assert_eq!(t, before);
    }

    #[test]
    fn edit_cell_changes_exactly_one_cell() {
        let mut t = sample();
        let before = t.clone();
        t.edit_cell("flag", "3", "FALSE").unwrap();
        let diffs = t
            .rows
            .iter()
            .flatten()
            .zip(before.rows.iter().flatten())
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(diffs, 1);
        assert_eq!(t.rows[3][3], CellValue::Bool(false));
    }

    #[test]
    fn edit_cell_widens_integer_column() {
        let mut t = sample();
        t.edit_cell("a", "0", "1.25").unwrap();
        assert_eq!(t.columns[1].dtype, DType::Float);
        assert_eq!(t.rows[0][1], CellValue::Float(1.25));
        assert_eq!(t.rows[3][1], CellValue::Float(4.0));
    }

    #[test]
    fn replace_true_with_false() {
        let mut t = sample();
        let changed = t.replace_value("flag", "true", "false").unwrap();
        assert_eq!(changed, 3);
        let falses = t
            .rows
            .iter()
            .filter(|r| r[3] == CellValue::Bool(false))
            .count();
        assert_eq!(falses, 5);
        assert_eq!(t.columns[3].dtype, DType::Bool);
    }

    #[test]
    fn replace_refuses_the_index_column() {
        let mut t = sample();
        let before = t.clone();
        assert!(matches!(
            t.replace_value(INDEX_COLUMN, "2", "0"),
            Err(PlotError::InvalidInput(_))
        ));
        assert!(matches!(
            t.replace_value(INDEX_COLUMN, "1", "nan"),
            Err(PlotError::InvalidInput(_))
        ));
        assert_eq!(t, before);
    }

    #[test]
    fn replace_with_nan_stores_null() {
        let mut t = sample();
        assert_eq!(t.replace_value("a", "4", "NaN").unwrap(), 1);
        assert!(t.rows[3][1].is_null());
        assert!(matches!(
            t.replace_value("zzz", "1", "2"),
            Err(PlotError::ColumnNotFound(_))
        ));
    }
}
