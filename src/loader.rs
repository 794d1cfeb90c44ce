use crate::cell::{CellValue, DType};
use crate::error::{PlotError, PlotResult};
use crate::table::{Column, TableSnapshot};
use std::path::Path;

/// Parse CSV content into a snapshot with inferred column types.
///
/// The first record is the header. Short records are padded with nulls and
/// long ones truncated, so every row lines up with the header. The `Index`
/// column is synthesized if the file does not carry one.
///
/// # Errors
/// * `InvalidFormat` if the content is not UTF-8 CSV or has no header
pub fn from_csv_bytes(bytes: &[u8]) -> PlotResult<TableSnapshot> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PlotError::InvalidFormat(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(PlotError::InvalidFormat("CSV file has no header row".into()));
    }
    let headers = dedupe_headers(headers);

    let mut raw: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| PlotError::InvalidFormat(e.to_string()))?;
        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        fields.resize(headers.len(), String::new());
        raw.push(fields);
    }

    let columns: Vec<Column> = headers
        .into_iter()
        .enumerate()
        .map(|(c, name)| Column {
            name,
            dtype: DType::infer(raw.iter().map(|r| r[c].as_str())),
        })
        .collect();

    let rows = raw
        .iter()
        .map(|fields| {
            fields
                .iter()
                .zip(&columns)
                .map(|(field, column)| CellValue::from_field(field, column.dtype))
                .collect()
        })
        .collect();

    let mut snapshot = TableSnapshot::new(columns, rows);
    snapshot.ensure_index();
    Ok(snapshot)
}

/// Load a CSV file from disk
pub fn from_csv(filepath: impl AsRef<Path>) -> PlotResult<TableSnapshot> {
    let bytes = std::fs::read(filepath)?;
    from_csv_bytes(&bytes)
}

// Blank or repeated header names get a positional suffix, the way dataframe
// readers do ("Unnamed: 2", "a.1").
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(headers.len());
    for (i, header) in headers.into_iter().enumerate() {
        let base = if header.is_empty() {
            format!("Unnamed: {}", i)
        } else {
            header
        };
        let mut name = base.clone();
        let mut n = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", base, n);
            n += 1;
        }
        seen.push(name);
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::INDEX_COLUMN;

    #[test]
    fn loads_and_synthesizes_index() {
        let t = from_csv_bytes(b"a,b\n1,2\n,4\n").unwrap();
        assert_eq!(t.column_names(), vec![INDEX_COLUMN, "a", "b"]);
        assert_eq!(t.columns[1].dtype, DType::Int);
        assert_eq!(t.rows[1], vec![CellValue::Int(1), CellValue::Null, CellValue::Int(4)]);
    }

    #[test]
    fn keeps_existing_index_column() {
        let t = from_csv_bytes(b"Index,x\n3,a\n7,b\n").unwrap();
        assert_eq!(t.columns.len(), 2);
        assert_eq!(t.rows[1][0], CellValue::Int(7));
    }

    #[test]
    fn pads_ragged_rows_and_names_blank_headers() {
        let t = from_csv_bytes(b"a,,a\n1\n1,2,3,4\n").unwrap();
        assert_eq!(t.column_names(), vec![INDEX_COLUMN, "a", "Unnamed: 1", "a.1"]);
        assert!(t.rows[0][2].is_null());
        assert_eq!(t.rows[1][3], CellValue::Int(3));
    }

    #[test]
    fn header_only_file_is_empty() {
        let t = from_csv_bytes(b"a,b\n").unwrap();
        assert!(t.is_empty());
        assert!(from_csv_bytes(b"").is_err());
    }
}
