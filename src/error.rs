//! Error types for the dumpling client
//!
//! - `TransferError`: everything a queued upload/download or the orchestrator can hit
//! - `ServiceError`: failures talking to the dumpling service
//! - `ConfigError`: loading and validating `ClientConfig`

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransferError>;

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Error, Debug)]
pub enum TransferError {
    /// Work was submitted after the pool started draining
    #[error("worker pool unavailable: {0}")]
    Pool(#[from] work_pool::PoolError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Downloaded content did not hash to the requested value
    #[error("downloaded file {path} did not match expected hash value {expected} (got {actual})")]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    #[error("path is neither a file nor a directory: {0}")]
    MissingPath(PathBuf),

    #[error("invalid artifact hash '{0}': expected 40 hex characters")]
    InvalidHash(String),
}

impl TransferError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode service response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error while streaming: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start HTTP runtime: {0}")]
    Runtime(String),

    #[error("too many redirects requesting {0}")]
    Redirects(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
