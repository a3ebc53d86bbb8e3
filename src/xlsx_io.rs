use calamine::{Data, DataType, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::error::{EnrichError, Result};
use crate::table::{Table, Value};

/// Name of the single worksheet written on export.
pub const SHEET_NAME: &str = "Dados";

/// Largest integer an XLSX number cell holds exactly.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Read the first worksheet. Its first row is the header.
///
/// Workbooks store every number as a float; integral numbers come back as
/// `Int`, the way spreadsheet readers narrow whole-number columns.
/// Fully empty trailing rows are not part of the sheet and are dropped.
pub fn read_xlsx<R: Read + Seek>(reader: R) -> Result<Table> {
    let mut workbook: Xlsx<R> = Xlsx::new(reader)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Err(EnrichError::validation("workbook has no worksheets")),
    };

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    let mut table = Table::new(header.iter().map(|cell| cell.to_string()).collect());
    for row in rows {
        table.push_row(row.iter().map(from_cell).collect());
    }
    Ok(table)
}

pub fn read_xlsx_file(path: &Path) -> Result<Table> {
    let start_time = Instant::now();
    let file = File::open(path).map_err(|e| EnrichError::io(path, e))?;
    let table = read_xlsx(BufReader::new(file))?;
    info!(
        action = "read",
        component = "xlsx",
        file_path = ?path,
        row_count = table.len(),
        column_count = table.columns().len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Loaded uploaded table"
    );
    Ok(table)
}

fn from_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() <= MAX_EXACT_INT => Value::Int(*f as i64),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) => Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Value::Null,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(e) => Value::Text(e.to_string()),
    }
}

/// Build a workbook with one sheet named [`SHEET_NAME`]: the header row, then
/// one row per table row. Null cells are left blank.
fn build_workbook(table: &Table) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in table.columns().iter().enumerate() {
        worksheet.write_string(0, sheet_col(col)?, name)?;
    }
    for (idx, row) in table.rows().iter().enumerate() {
        let sheet_row = u32::try_from(idx + 1)
            .map_err(|_| EnrichError::validation("too many rows for a worksheet"))?;
        for (col, value) in row.iter().enumerate() {
            let col = sheet_col(col)?;
            match value {
                Value::Null => {}
                Value::Int(i) => {
                    worksheet.write_number(sheet_row, col, *i as f64)?;
                }
                Value::Float(f) => {
                    worksheet.write_number(sheet_row, col, *f)?;
                }
                Value::Bool(b) => {
                    worksheet.write_boolean(sheet_row, col, *b)?;
                }
                Value::Text(s) => {
                    worksheet.write_string(sheet_row, col, s)?;
                }
            }
        }
    }
    Ok(workbook)
}

fn sheet_col(idx: usize) -> Result<u16> {
    u16::try_from(idx).map_err(|_| EnrichError::validation("too many columns for a worksheet"))
}

pub fn to_xlsx_bytes(table: &Table) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(table)?;
    Ok(workbook.save_to_buffer()?)
}

pub fn write_xlsx_file(table: &Table, path: &Path) -> Result<()> {
    let mut workbook = build_workbook(table)?;
    workbook.save(path)?;
    info!(action = "write", component = "xlsx", file_path = ?path, row_count = table.len(), "Wrote table");
    Ok(())
}

/// Parse workbook bytes, e.g. a download produced by [`to_xlsx_bytes`].
pub fn read_xlsx_bytes(bytes: &[u8]) -> Result<Table> {
    read_xlsx(Cursor::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(vec![
            "url".into(),
            "users".into(),
            "bounce_rate".into(),
            "note".into(),
        ]);
        table.push_row(vec![
            "https://a.com/x?y=1,2".into(),
            Value::Int(1500),
            Value::Float(0.41),
            "  ".into(),
        ]);
        table.push_row(vec![
            "https://b.org".into(),
            Value::Null,
            Value::Float(0.25),
            Value::Bool(true),
        ]);
        table.push_row(vec![
            Value::Null,
            Value::Int(-3),
            Value::Null,
            "last".into(),
        ]);
        table
    }

    #[test]
    fn export_then_reparse_keeps_rows_and_values() {
        let table = sample();
        let reparsed = read_xlsx_bytes(&to_xlsx_bytes(&table).unwrap()).unwrap();
        assert_eq!(reparsed, table);
    }

    #[test]
    fn file_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filled.xlsx");
        let table = sample();

        write_xlsx_file(&table, &path).unwrap();
        let reparsed = read_xlsx_file(&path).unwrap();
        assert_eq!(reparsed.columns(), table.columns());
        assert_eq!(reparsed.len(), table.len());
        assert_eq!(reparsed.get(0, "users"), Some(&Value::Int(1500)));
    }

    #[test]
    fn header_only_table_round_trips() {
        let table = Table::new(vec!["a".into(), "b".into()]);
        let reparsed = read_xlsx_bytes(&to_xlsx_bytes(&table).unwrap()).unwrap();
        assert!(reparsed.is_empty());
        assert_eq!(reparsed.columns(), table.columns());
    }

    #[test]
    fn whole_floats_read_back_as_ints() {
        assert_eq!(from_cell(&Data::Float(12.0)), Value::Int(12));
        assert_eq!(from_cell(&Data::Float(0.5)), Value::Float(0.5));
        assert_eq!(from_cell(&Data::String(String::new())), Value::Null);
    }

    #[test]
    fn garbage_bytes_are_an_error() {
        assert!(read_xlsx_bytes(b"url,users\nx,1\n").is_err());
    }
}
