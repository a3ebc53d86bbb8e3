use std::path::PathBuf;

/// Errors raised by the library side of trafficfill.
///
/// The binary wraps these in `anyhow` for reporting.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("xlsx read error: {0}")]
    XlsxRead(#[from] calamine::XlsxError),

    #[error("xlsx write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("authentication failed for user '{0}'")]
    Auth(String),

    #[error("validation error: {message}")]
    Validation { message: String },
}

pub type Result<T> = std::result::Result<T, EnrichError>;

impl EnrichError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
