use std::path::Path;

use crate::error::{EnrichError, Result};
use crate::table::Table;
use crate::{csv_io, xlsx_io};

/// Spreadsheet formats accepted for upload and offered for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
}

impl TableFormat {
    /// Pick the format from the file extension, ignoring case. A path without
    /// an extension is treated as CSV.
    pub fn from_path(path: &Path) -> Result<Self> {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Ok(TableFormat::Csv);
        };
        if ext.eq_ignore_ascii_case("csv") {
            Ok(TableFormat::Csv)
        } else if ext.eq_ignore_ascii_case("xlsx") {
            Ok(TableFormat::Xlsx)
        } else {
            Err(EnrichError::validation(format!(
                "unsupported file type '.{}' (expected .csv or .xlsx)",
                ext
            )))
        }
    }
}

pub fn read_table_file(path: &Path) -> Result<Table> {
    match TableFormat::from_path(path)? {
        TableFormat::Csv => csv_io::read_csv_file(path),
        TableFormat::Xlsx => xlsx_io::read_xlsx_file(path),
    }
}

pub fn write_table_file(table: &Table, path: &Path) -> Result<()> {
    match TableFormat::from_path(path)? {
        TableFormat::Csv => csv_io::write_csv_file(table, path),
        TableFormat::Xlsx => xlsx_io::write_xlsx_file(table, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    #[test]
    fn format_follows_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a.csv")).unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_path(Path::new("a.XLSX")).unwrap(), TableFormat::Xlsx);
        assert_eq!(TableFormat::from_path(Path::new("upload")).unwrap(), TableFormat::Csv);
        assert!(matches!(
            TableFormat::from_path(Path::new("a.xls")),
            Err(EnrichError::Validation { .. })
        ));
    }

    #[test]
    fn same_table_through_either_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = Table::new(vec!["url".into(), "users".into()]);
        table.push_row(vec!["https://a.com".into(), Value::Int(7)]);
        table.push_row(vec!["https://b.com".into(), Value::Null]);

        for name in ["out.csv", "out.xlsx"] {
            let path = dir.path().join(name);
            write_table_file(&table, &path).unwrap();
            assert_eq!(read_table_file(&path).unwrap(), table);
        }
    }
}
