//! Error types for adsblogger.
//!
//! This module defines all error types used throughout the adsblogger crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for adsblogger operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Feed Errors ===
    /// The aircraft feed could not be fetched.
    #[error("failed to fetch feed from {url}: {source}")]
    FeedRequest {
        /// Location of the feed.
        url: String,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The aircraft feed returned a document that is not a snapshot.
    #[error("failed to decode feed snapshot: {message}")]
    FeedDecode {
        /// Description of what was wrong with the document.
        message: String,
    },

    /// The aircraft feed did not answer within the poll timeout.
    #[error("feed request timed out after {seconds}s")]
    FeedTimeout {
        /// The configured timeout.
        seconds: u64,
    },

    /// The aircraft feed file could not be read.
    #[error("failed to read feed from {path}: {source}")]
    FeedRead {
        /// Path of the feed file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for adsblogger operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new feed decode error.
    #[must_use]
    pub fn feed_decode(message: impl Into<String>) -> Self {
        Self::FeedDecode {
            message: message.into(),
        }
    }

    /// Check if this error came from the feed rather than from local state.
    ///
    /// Feed errors are transient: the tracking loop logs them and retries on
    /// its next tick.
    #[must_use]
    pub fn is_feed_error(&self) -> bool {
        matches!(
            self,
            Self::FeedRequest { .. }
                | Self::FeedRead { .. }
                | Self::FeedDecode { .. }
                | Self::FeedTimeout { .. }
        )
    }

    /// Check if this error is a uniqueness or other constraint violation
    /// reported by the database for a single write.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::DatabaseQuery(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::internal("test error");
        assert_eq!(err.to_string(), "internal error: test error");

        let err = Error::FeedTimeout { seconds: 3 };
        assert_eq!(err.to_string(), "feed request timed out after 3s");
    }

    #[test]
    fn test_feed_decode_error() {
        let err = Error::feed_decode("missing `now`");
        let msg = err.to_string();
        assert!(msg.contains("decode"));
        assert!(msg.contains("missing `now`"));
    }

    #[test]
    fn test_is_feed_error() {
        assert!(Error::FeedTimeout { seconds: 1 }.is_feed_error());
        assert!(Error::feed_decode("bad").is_feed_error());
        let read = Error::FeedRead {
            path: PathBuf::from("/run/readsb/aircraft.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(read.is_feed_error());
        assert!(read.to_string().contains("/run/readsb/aircraft.json"));
        assert!(!Error::Io(std::io::Error::other("disk")).is_feed_error());
        assert!(!Error::internal("bad").is_feed_error());
    }

    #[test]
    fn test_is_constraint_violation() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (id TEXT PRIMARY KEY)", [])
            .unwrap();
        conn.execute("INSERT INTO t (id) VALUES ('a')", []).unwrap();
        let sqlite_err = conn
            .execute("INSERT INTO t (id) VALUES ('a')", [])
            .unwrap_err();

        let err: Error = sqlite_err.into();
        assert!(err.is_constraint_violation());
        assert!(!Error::internal("x").is_constraint_violation());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        // Create a rusqlite error by trying to open a non-existent DB in read-only mode
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "invalid interval".to_string(),
        };
        assert!(err.to_string().contains("invalid interval"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("/root/forbidden"));
    }

    #[test]
    fn test_database_open_error_display() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err = Error::DatabaseOpen {
                path: PathBuf::from("/nonexistent/path/db.sqlite"),
                source: sqlite_err,
            };
            let msg = err.to_string();
            assert!(msg.contains("/nonexistent/path/db.sqlite"));
        }
    }
}
