//! Error types for the sync engine

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Position of a source row in error messages.
///
/// CSV rows are reported by physical line (the header is line 1), warehouse
/// rows by their 1-based ordinal in the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLocator {
    Line(u64),
    Row(u64),
}

impl fmt::Display for RowLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowLocator::Line(n) => write!(f, "line {n}"),
            RowLocator::Row(n) => write!(f, "row {n}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Common(#[from] ztmf_common::ZtmfError),

    #[error("invalid invocation event: {0}")]
    InvalidEvent(String),

    #[error("invalid S3 key {0:?}: must start with 'incoming/' and end with '.csv'")]
    InvalidKey(String),

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("{at}: {column} is empty")]
    EmptyField { at: RowLocator, column: &'static str },

    #[error("{at}: cannot parse {column} timestamp {value:?}{}", .position.map(|p| format!(" (column {p})")).unwrap_or_default())]
    InvalidTimestamp {
        at: RowLocator,
        column: &'static str,
        position: Option<usize>,
        value: String,
    },

    #[error("{at}: malformed CSV record: {message}")]
    MalformedCsv { at: RowLocator, message: String },

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("unregistered WHERE clause rejected: {0:?}")]
    UnregisteredPredicate(String),

    #[error("column {column} has unsupported type {type_name}")]
    UnsupportedColumnType { column: String, type_name: String },

    #[error("failed to connect to {store}: {reason}")]
    Connect { store: &'static str, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to insert batch starting at row {start} into {table}: {source}")]
    BatchInsert {
        table: String,
        start: usize,
        #[source]
        source: Box<SyncError>,
    },

    #[error("row shape mismatch: {0}")]
    RowShape(String),

    #[error("row count mismatch for {table}: extracted {expected}, loaded {actual}")]
    RowCountMismatch {
        table: String,
        expected: u64,
        actual: u64,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled during {0}")]
    Cancelled(&'static str),

    #[error("invalid phase transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            SyncError::Cancelled(_) => true,
            SyncError::BatchInsert { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Strips `user:password@` from a connection string before it is logged.
pub fn redact_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            parsed.to_string()
        },
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<unparsable url>".to_string(),
    }
}
