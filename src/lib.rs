pub mod args;
pub mod browse;
pub mod config;
pub mod csv_io;
pub mod domain;
pub mod enrich;
pub mod error;
pub mod file_format;
pub mod stats;
pub mod store;
pub mod table;
pub mod upload;
pub mod users;
pub mod utils;
pub mod xlsx_io;

pub use args::Args;
pub use domain::{extract_cell, extract_domain, DomainKey};
pub use enrich::{merge, ColumnMapping, Enricher, EnrichmentQuery, EnrichmentRow};
pub use error::{EnrichError, Result};
pub use file_format::{read_table_file, write_table_file, TableFormat};
pub use stats::{ExtractionSummary, UploadResult};
pub use store::{DataStore, Filter, SqliteStore};
pub use table::{Table, Value};
pub use users::{Session, UserStore};
