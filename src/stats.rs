use crate::domain::DomainKey;
use crate::table::Table;

#[derive(Debug, Default, PartialEq)]
pub struct ExtractionSummary {
    /// Distinct keys in first-seen row order.
    pub unique_keys: Vec<DomainKey>,
    pub rows_with_key: usize,
    pub rows_without_key: usize,
}

#[derive(Debug)]
pub struct UploadResult {
    pub extraction: ExtractionSummary,
    pub enrichment_rows: usize,
    pub merged: Table,
}
