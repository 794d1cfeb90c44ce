use crate::cell::CellValue;
use crate::error::PlotResult;
use crate::table::TableSnapshot;

/// Convert a snapshot to CSV text
///
/// The header row carries the column names (including `Index`), nulls are
/// written as empty fields and quoting is left to the CSV writer. The output
/// loads back into an equal snapshot via [`crate::loader::from_csv_bytes`].
pub fn to_csv(table: &TableSnapshot) -> PlotResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.columns.iter().map(|c| c.name.as_str()))?;
    for row in &table.rows {
        writer.write_record(row.iter().map(CellValue::to_field))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Convert a snapshot to an XLSX workbook
///
/// Numbers and booleans keep their type in the sheet; nulls are left blank.
pub fn to_xlsx(table: &TableSnapshot) -> PlotResult<Vec<u8>> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    for (c, column) in table.columns.iter().enumerate() {
        worksheet.write_string(0, c as u16, column.name.as_str())?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let xr = (r + 1) as u32;
        for (c, value) in row.iter().enumerate() {
            let xc = c as u16;
            match value {
                CellValue::Int(i) => {
                    worksheet.write_number(xr, xc, *i as f64)?;
                }
                CellValue::Float(f) if f.is_finite() => {
                    worksheet.write_number(xr, xc, *f)?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(xr, xc, *b)?;
                }
                CellValue::Null => {}
                other => {
                    worksheet.write_string(xr, xc, other.to_field().as_str())?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::from_csv_bytes;

    #[test]
    fn csv_round_trips_through_loader() {
        let original =
            from_csv_bytes(b"name,score,ok\n\"Smith, J\",1.5,true\nLee,,false\n").unwrap();
        let text = to_csv(&original).unwrap();
        assert!(text.starts_with("Index,name,score,ok\n"));
        assert!(text.contains("\"Smith, J\""));
        let reloaded = from_csv_bytes(text.as_bytes()).unwrap();
        assert_eq!(reloaded, original);
    }

    #[test]
    fn xlsx_is_a_zip_container() {
        let t = from_csv_bytes(b"a,b\n1,x\n").unwrap();
        let bytes = to_xlsx(&t).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
