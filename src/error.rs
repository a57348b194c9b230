//! Error types for epub-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error sub-enums (Database, Archive)
//! - HTTP status classification for retry decisions
//! - A clear split between fatal errors (abort the run) and per-file
//!   failures (accumulated alongside a successful result)

use thiserror::Error;

/// Result type alias for epub-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for epub-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Network-level failure (timeout, reset, DNS, TLS)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server responded with a non-success HTTP status
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// The status code returned by the server
        status: u16,
        /// The request URL
        url: String,
    },

    /// Book metadata could not be fetched, even after the alternate-kind fallback
    #[error("metadata unavailable for {id}: {reason}")]
    MetadataUnavailable {
        /// The book identifier that failed to resolve
        id: String,
        /// Why the metadata fetch failed
        reason: String,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Archive assembly failed (no partial output is produced)
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The run was cancelled via its cancellation token
    #[error("download cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Archive assembly errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// No `mimetype` entry was supplied
    #[error("archive is missing the mandatory mimetype entry")]
    MissingMimetype,

    /// The `mimetype` entry was present but not first
    #[error("mimetype entry must be the first archive entry, found at position {position}")]
    MimetypeNotFirst {
        /// Zero-based position where the mimetype entry was found
        position: usize,
    },

    /// A package descriptor entry exists but no container entry points at it
    #[error("package descriptor {path} has no container.xml entry referencing it")]
    MissingContainer {
        /// Archive path of the orphaned package descriptor
        path: String,
    },

    /// The zip writer rejected an entry or failed to finalize
    #[error("failed to write archive: {0}")]
    WriteFailed(String),
}

impl Error {
    /// Returns true if the error is transient and the operation should be retried
    ///
    /// Transient: network-level failures, HTTP 429, HTTP >= 500.
    /// Everything else (other 4xx, database, archive, cancellation) is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => !e.is_builder() && !e.is_decode(),
            Error::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_is_retryable() {
        let err = Error::HttpStatus {
            status: 429,
            url: "https://example.com/file".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn http_5xx_is_retryable() {
        for status in [500, 502, 503, 504] {
            let err = Error::HttpStatus {
                status,
                url: "https://example.com/file".to_string(),
            };
            assert!(err.is_retryable(), "HTTP {status} should be retryable");
        }
    }

    #[test]
    fn http_4xx_other_than_429_is_not_retryable() {
        for status in [400, 401, 403, 404, 410] {
            let err = Error::HttpStatus {
                status,
                url: "https://example.com/file".to_string(),
            };
            assert!(!err.is_retryable(), "HTTP {status} should be permanent");
        }
    }

    #[test]
    fn database_error_is_not_retryable() {
        let err = Error::Database(DatabaseError::QueryFailed("locked".to_string()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn archive_error_is_not_retryable() {
        let err = Error::Archive(ArchiveError::MissingMimetype);
        assert!(!err.is_retryable());
    }

    #[test]
    fn cancelled_is_not_retryable() {
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn metadata_unavailable_is_not_retryable() {
        let err = Error::MetadataUnavailable {
            id: "urn:orm:book:123".to_string(),
            reason: "HTTP 404".to_string(),
        };
        assert!(!err.is_retryable());
    }
}
