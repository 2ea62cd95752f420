//! Unified error types for precache.
//!
//! Every variant carries a stable code prefix so hosts can match on the
//! failure class without parsing the message.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the cache worker and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., unknown control message).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL or a URL outside the worker origin.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The build-time manifest violates a structural rule.
    #[error("INVALID_MANIFEST: {0}")]
    InvalidManifest(String),

    /// The stored manifest record could not be decoded or failed its digest check.
    #[error("MANIFEST_CORRUPT: {0}")]
    CorruptManifest(String),

    /// Database operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Storage operation failed outside the database driver.
    #[error("STORAGE_ERROR: {0}")]
    Storage(String),

    /// Transport-level fetch failure (DNS, connect, reset).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// A response was received but its status is not cacheable.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::InvalidManifest(msg) => (-32013, msg.clone()),
            Error::CorruptManifest(msg) => (-32014, msg.clone()),
            Error::Network(msg) => (-32015, msg.clone()),
            Error::FetchTimeout(msg) => (-32006, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::HttpError(msg) => (-32008, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::Storage(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CorruptManifest("digest mismatch".to_string());
        assert!(err.to_string().contains("MANIFEST_CORRUPT"));
        assert!(err.to_string().contains("digest mismatch"));
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::HttpError("status 404".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32008);
    }

    #[test]
    fn test_storage_variants_share_code() {
        let from_driver: McpError = Error::from(rusqlite::Error::QueryReturnedNoRows).into();
        let from_backend: McpError = Error::Storage("region vanished".into()).into();
        assert_eq!(from_driver.code, from_backend.code);
    }
}
