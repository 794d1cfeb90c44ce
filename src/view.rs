use crate::cell::CellValue;
use crate::table::TableSnapshot;
use serde::{Deserialize, Serialize};

/// Default number of table rows per page.
pub const PAGE_SIZE: usize = 10;

/// The current dataset formatted for display, cached in the session until the
/// dataset changes.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct DatasetView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One page of a [`DatasetView`]
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct Page {
    pub number: usize,
    pub num_pages: usize,
    pub total_rows: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous: usize,
    pub next: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DatasetView {
    pub fn of(table: &TableSnapshot) -> Self {
        DatasetView {
            columns: table.column_names(),
            rows: table
                .rows
                .iter()
                .map(|row| row.iter().map(CellValue::display).collect())
                .collect(),
        }
    }

    pub fn num_pages(&self, per_page: usize) -> usize {
        self.rows.len().div_ceil(per_page.max(1)).max(1)
    }

    /// Select a page the way a lenient paginator does: a missing or
    /// non-numeric page number means the first page, and any number outside
    /// the valid range means the last one.
    pub fn page(&self, requested: Option<&str>, per_page: usize) -> Page {
        let per_page = per_page.max(1);
        let num_pages = self.num_pages(per_page);
        let number = match requested.map(|p| p.trim().parse::<i64>()) {
            None | Some(Err(_)) => 1,
            Some(Ok(n)) if n >= 1 && (n as usize) <= num_pages => n as usize,
            Some(Ok(_)) => num_pages,
        };

        let start = (number - 1) * per_page;
        let end = (start + per_page).min(self.rows.len());
        Page {
            number,
            num_pages,
            total_rows: self.rows.len(),
            has_previous: number > 1,
            has_next: number < num_pages,
            previous: number.saturating_sub(1).max(1),
            next: (number + 1).min(num_pages),
            columns: self.columns.clone(),
            rows: self.rows.get(start..end).unwrap_or_default().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::from_csv_bytes;

    fn view(rows: usize) -> DatasetView {
        let mut csv = String::from("v\n");
        for i in 0..rows {
            csv.push_str(&format!("{}.5\n", i));
        }
        DatasetView::of(&from_csv_bytes(csv.as_bytes()).unwrap())
    }

    #[test]
    fn formats_cells_for_display() {
        let t = from_csv_bytes(b"a,b,c\n1.234567,true,\n").unwrap();
        let v = DatasetView::of(&t);
        assert_eq!(v.columns, vec!["Index", "a", "b", "c"]);
        assert_eq!(v.rows[0], vec!["0", "1.2346", "True", ""]);
    }

    #[test]
    fn pages_hold_ten_rows() {
        let v = view(25);
        let p = v.page(Some("2"), PAGE_SIZE);
        assert_eq!(p.num_pages, 3);
        assert_eq!(p.rows.len(), 10);
        assert_eq!(p.rows[0][0], "10");
        assert!(p.has_previous && p.has_next);
        assert_eq!(v.page(Some("3"), PAGE_SIZE).rows.len(), 5);
    }

    #[test]
    fn out_of_range_pages_clamp() {
        let v = view(25);
        assert_eq!(v.page(Some("abc"), PAGE_SIZE).number, 1);
        assert_eq!(v.page(None, PAGE_SIZE).number, 1);
        assert_eq!(v.page(Some("99"), PAGE_SIZE).number, 3);
        assert_eq!(v.page(Some("0"), PAGE_SIZE).number, 3);
        let empty = DatasetView::default();
        let p = empty.page(Some("4"), PAGE_SIZE);
        assert_eq!((p.number, p.num_pages), (1, 1));
        assert!(p.rows.is_empty());
    }
}
