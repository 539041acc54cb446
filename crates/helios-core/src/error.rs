// crates/helios-core/src/error.rs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("input resource not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("sink failure for destination '{destination}': {message}")]
    Sink {
        destination: String,
        message: String,
    },

    #[error("polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;
