//! Error types for hashpack_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using hashpack_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, verifying, archiving or deploying a store.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Hash algorithm name is not one of the supported set.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    /// No credentials are configured for a logical server name.
    #[error("No credentials configured for server: {server}")]
    MissingCredentials { server: String },

    /// Network or authentication failure against the remote host.
    #[error("Connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },

    /// A remote operation failed after the session was established.
    #[error("Remote {operation} failed for {path}: {reason}")]
    Remote {
        operation: &'static str,
        path: String,
        reason: String,
    },

    /// A source entry is neither a directory nor a regular file.
    #[error("Unsupported file type: {path}")]
    UnsupportedFileType { path: PathBuf },

    /// A path cannot be represented as a manifest path.
    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    /// Two source roots provide the same logical asset path.
    #[error("Duplicate asset path: {path}")]
    DuplicateAsset { path: String },

    /// Two different contents produced the same digest.
    #[error("Hash collision on {hash}: {path} differs from the stored object")]
    HashCollision { hash: String, path: String },

    /// Invalid hash format or encoding.
    #[error("Invalid hash: {reason}")]
    InvalidHash { reason: String },

    /// Manifest document could not be encoded or decoded.
    #[error("Manifest error: {source}")]
    Manifest {
        #[from]
        source: serde_json::Error,
    },

    /// Settings file could not be parsed.
    #[error("Invalid settings at {path}: {reason}")]
    InvalidSettings { path: PathBuf, reason: String },
}

/// Coarse classification of an [`Error`], used for exit codes and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Rejected before any I/O took place.
    Configuration,
    /// The remote host could not be reached or refused the login.
    Connection,
    /// Reading or writing local or remote data failed.
    Io,
}

impl Error {
    /// Create an UnsupportedAlgorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Create a MissingCredentials error.
    pub fn missing_credentials(server: impl Into<String>) -> Self {
        Error::MissingCredentials {
            server: server.into(),
        }
    }

    /// Create a Connection error.
    pub fn connection(host: impl Into<String>, reason: impl ToString) -> Self {
        Error::Connection {
            host: host.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a Remote error.
    pub fn remote(operation: &'static str, path: impl Into<String>, reason: impl ToString) -> Self {
        Error::Remote {
            operation,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an UnsupportedFileType error.
    pub fn unsupported_file_type(path: impl Into<PathBuf>) -> Self {
        Error::UnsupportedFileType { path: path.into() }
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a DuplicateAsset error.
    pub fn duplicate_asset(path: impl Into<String>) -> Self {
        Error::DuplicateAsset { path: path.into() }
    }

    /// Create a HashCollision error.
    pub fn hash_collision(hash: impl Into<String>, path: impl Into<String>) -> Self {
        Error::HashCollision {
            hash: hash.into(),
            path: path.into(),
        }
    }

    /// Create an InvalidHash error.
    pub fn invalid_hash(reason: impl Into<String>) -> Self {
        Error::InvalidHash {
            reason: reason.into(),
        }
    }

    /// Create an InvalidSettings error.
    pub fn invalid_settings(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidSettings {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn category(&self) -> Category {
        match self {
            Error::UnsupportedAlgorithm { .. }
            | Error::MissingCredentials { .. }
            | Error::InvalidSettings { .. } => Category::Configuration,
            Error::Connection { .. } => Category::Connection,
            _ => Category::Io,
        }
    }
}

// Additional From implementations for external error types

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}

impl From<ignore::Error> for Error {
    fn from(err: ignore::Error) -> Self {
        // ignore::Error can wrap an io::Error or be a path error
        match err.io_error() {
            Some(io_err) => Error::Io {
                source: std::io::Error::new(io_err.kind(), io_err.to_string()),
            },
            None => Error::Io {
                source: std::io::Error::other(err.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            Error::unsupported_algorithm("crc32").category(),
            Category::Configuration
        );
        assert_eq!(
            Error::missing_credentials("assets").category(),
            Category::Configuration
        );
        assert_eq!(
            Error::connection("example.org", "refused").category(),
            Category::Connection
        );
        assert_eq!(
            Error::from(std::io::Error::other("boom")).category(),
            Category::Io
        );
        assert_eq!(
            Error::remote("store", "data/a/b/ab", "550").category(),
            Category::Io
        );
    }

    #[test]
    fn test_messages() {
        let err = Error::unsupported_algorithm("crc32");
        assert_eq!(err.to_string(), "Unsupported algorithm: crc32");

        let err = Error::remote("mkdir", "data/a", "550 Permission denied");
        assert_eq!(
            err.to_string(),
            "Remote mkdir failed for data/a: 550 Permission denied"
        );
    }
}
