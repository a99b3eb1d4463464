//! Error types for geopac.

use thiserror::Error;

/// Error type for geopac operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or truncated geosite database
    #[error("failed to parse geosite database: {0}")]
    Parse(String),

    /// Group selector with more than one '@'
    #[error("invalid group selector: {0}")]
    InvalidSelector(String),

    /// Group name absent from the database
    #[error("geosite group not found: {0}")]
    GroupNotFound(String),

    /// Remote checksum body is not a 64 character hex digest
    #[error("invalid remote checksum: {0}")]
    InvalidChecksum(String),

    /// Downloaded database does not hash to the published digest
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File watcher error
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Download error
    #[error("download error: {0}")]
    Download(#[from] reqwest::Error),
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Error::Parse(e.to_string())
    }
}

/// Result type alias for geopac operations.
pub type Result<T> = std::result::Result<T, Error>;
