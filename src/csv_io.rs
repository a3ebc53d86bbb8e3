use csv::{ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::error::{EnrichError, Result};
use crate::table::{Table, Value};

/// Parse CSV with a header row. Cells are type-inferred; ragged rows are
/// padded with nulls.
pub fn read_csv<R: Read>(reader: R) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<String> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if idx == 0 {
                name.trim_start_matches('\u{feff}').to_string()
            } else {
                name.to_string()
            }
        })
        .collect();
    let mut table = Table::new(columns);

    for record in rdr.records() {
        let record = record?;
        table.push_row(record.iter().map(Value::infer).collect());
    }
    Ok(table)
}

pub fn read_csv_file(path: &Path) -> Result<Table> {
    let start_time = Instant::now();
    let file = File::open(path).map_err(|e| EnrichError::io(path, e))?;
    let table = read_csv(file)?;
    info!(
        action = "read",
        component = "csv",
        file_path = ?path,
        row_count = table.len(),
        column_count = table.columns().len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Loaded uploaded table"
    );
    Ok(table)
}

/// Write the table with a header row; nulls become empty fields.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(table.columns())?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.flush().map_err(|e| EnrichError::Csv(e.into()))?;
    Ok(())
}

pub fn to_csv_bytes(table: &Table) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    Ok(buf)
}

pub fn write_csv_file(table: &Table, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| EnrichError::io(path, e))?;
    write_csv(table, file)?;
    info!(action = "write", component = "csv", file_path = ?path, row_count = table.len(), "Wrote table");
    Ok(())
}
