use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::domain::extract_cell;
use crate::enrich::{merge, ColumnMapping, Enricher, EnrichmentQuery};
use crate::error::{EnrichError, Result};
use crate::stats::{ExtractionSummary, UploadResult};
use crate::store::DataStore;
use crate::table::{Table, Value};
use crate::users::Session;
use crate::{file_format, utils};

pub struct UploadRequest {
    pub input: PathBuf,
    pub url_column: Option<String>,
    pub date: NaiveDate,
    pub attributes: Vec<String>,
    pub mapping: ColumnMapping,
}

/// The requested URL column, or the first column whose name mentions "url".
pub fn pick_url_column(table: &Table, requested: Option<&str>) -> Result<String> {
    match requested {
        Some(name) if table.column_index(name).is_some() => Ok(name.to_string()),
        Some(name) => Err(EnrichError::validation(format!(
            "column '{}' not found in uploaded file",
            name
        ))),
        None => table
            .url_columns()
            .first()
            .map(|c| c.to_string())
            .ok_or_else(|| {
                EnrichError::validation("no column with 'url' in its name; pass --url-column")
            }),
    }
}

/// Fill `key_column` with the domain key of each row's URL (null when absent).
pub fn extract_targets(
    table: &mut Table,
    url_column: &str,
    key_column: &str,
) -> Result<ExtractionSummary> {
    let start_time = Instant::now();
    let urls = table.column_values(url_column).ok_or_else(|| {
        EnrichError::validation(format!("column '{}' not found", url_column))
    })?;

    let keys: Vec<_> = urls.into_iter().map(extract_cell).collect();

    let mut summary = ExtractionSummary::default();
    let mut seen = HashSet::new();
    for key in keys.iter() {
        match key {
            Some(key) => {
                summary.rows_with_key += 1;
                if seen.insert(key.clone()) {
                    summary.unique_keys.push(key.clone());
                }
            }
            None => summary.rows_without_key += 1,
        }
    }

    table.set_column(key_column, keys.into_iter().map(Value::from).collect());

    info!(
        action = "complete",
        component = "domain_extraction",
        url_column = url_column,
        unique_keys = summary.unique_keys.len(),
        rows_without_key = summary.rows_without_key,
        duration_ms = start_time.elapsed().as_millis(),
        "Domain extraction completed"
    );
    Ok(summary)
}

/// Upload → extract → enrich → merge, for one user action.
pub fn run_upload<S: DataStore + ?Sized>(
    session: &Session,
    store: &S,
    database: &DatabaseConfig,
    request: &UploadRequest,
) -> Result<UploadResult> {
    let total_start_time = Instant::now();
    info!(
        action = "start",
        component = "upload",
        username = %session.username,
        input = ?request.input,
        "Starting upload enrichment"
    );

    let mut table = file_format::read_table_file(&request.input)?;
    let url_column = pick_url_column(&table, request.url_column.as_deref())?;
    let extraction = extract_targets(&mut table, &url_column, &database.key_column)?;

    let query = EnrichmentQuery::new(
        extraction.unique_keys.iter().cloned(),
        request.date,
        request.attributes.clone(),
    );
    let enricher = Enricher::new(store, &database.key_column, &database.date_column);
    let enrichment = enricher.enrich(&query)?;

    let merged = merge(
        &table,
        &database.key_column,
        &query.columns,
        &enrichment,
        &request.mapping,
    );

    info!(
        action = "complete",
        component = "upload",
        row_count = merged.len(),
        duration_ms = total_start_time.elapsed().as_millis(),
        "Upload enrichment completed"
    );

    Ok(UploadResult {
        extraction,
        enrichment_rows: enrichment.len(),
        merged,
    })
}

pub fn print_extraction_summary(summary: &ExtractionSummary, show: Option<usize>) {
    println!(
        "Rows with a domain: {}",
        utils::format_number(summary.rows_with_key)
    );
    println!(
        "Rows without a domain: {}",
        utils::format_number(summary.rows_without_key)
    );
    println!(
        "Unique domains to look up: {}",
        utils::format_number(summary.unique_keys.len())
    );

    if let Some(count) = show {
        println!(
            "\nFirst {} domains:",
            std::cmp::min(count, summary.unique_keys.len())
        );
        for key in summary.unique_keys.iter().take(count) {
            println!("- {}", key);
        }
    }
}

pub fn print_upload_results(result: &UploadResult, date: NaiveDate) {
    println!("\n--- Upload Enrichment ({}) ---", date);
    print_extraction_summary(&result.extraction, None);
    println!(
        "Store rows found: {}",
        utils::format_number(result.enrichment_rows)
    );
    if result.enrichment_rows == 0 {
        println!("No traffic data found for these domains on the selected date.");
    }
    println!(
        "Output: {} rows, {} columns",
        utils::format_number(result.merged.len()),
        utils::format_number(result.merged.columns().len())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainKey;

    fn upload() -> Table {
        let mut table = Table::new(vec!["Title".into(), "Page URL".into(), "site_url".into()]);
        table.push_row(vec!["a".into(), "https://www.example.com/x".into(), Value::Null]);
        table.push_row(vec!["b".into(), "https://g1.globo.com/sp/noticia".into(), Value::Null]);
        table.push_row(vec!["c".into(), Value::Int(42), Value::Null]);
        table.push_row(vec!["d".into(), "https://example.com/y".into(), Value::Null]);
        table
    }

    #[test]
    fn picks_first_url_column() {
        let table = upload();
        assert_eq!(pick_url_column(&table, None).unwrap(), "Page URL");
        assert_eq!(pick_url_column(&table, Some("site_url")).unwrap(), "site_url");
        assert!(pick_url_column(&table, Some("missing")).is_err());

        let no_urls = Table::new(vec!["name".into()]);
        assert!(pick_url_column(&no_urls, None).is_err());
    }

    #[test]
    fn extraction_fills_targets_and_counts() {
        let mut table = upload();
        let summary = extract_targets(&mut table, "Page URL", "targets").unwrap();

        assert_eq!(
            summary.unique_keys,
            vec![DomainKey::new("example.com"), DomainKey::new("g1.globo.com/sp")]
        );
        assert_eq!(summary.rows_with_key, 3);
        assert_eq!(summary.rows_without_key, 1);
        assert_eq!(table.get(1, "targets"), Some(&Value::Text("g1.globo.com/sp".into())));
        assert_eq!(table.get(2, "targets"), Some(&Value::Null));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn extraction_needs_existing_column() {
        let mut table = upload();
        assert!(extract_targets(&mut table, "nope", "targets").is_err());
    }
}
