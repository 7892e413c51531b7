//! Error types shared across ZTMF crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, ZtmfError>;

#[derive(Error, Debug)]
pub enum ZtmfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: String, value: String },
}
