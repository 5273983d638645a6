//! Error taxonomy for storage content operations.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::api::ApiError;
use crate::transfer::TransferError;

/// Errors raised by storage content operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StorageError {
    /// Raised when a content category is not permitted for the operation.
    #[error("invalid content type '{value}': expected one of {allowed}")]
    InvalidContentType {
        /// Value supplied by the caller.
        value: String,
        /// Comma separated list of permitted categories.
        allowed: String,
    },
    /// Raised when a local file does not exist.
    #[error("local file not found: {path}")]
    NotFound {
        /// Path that failed the existence check.
        path: Utf8PathBuf,
    },
    /// Raised when a local path names a directory instead of a file.
    #[error("file is a directory: {path}")]
    IsDirectory {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// Raised when a local file cannot be inspected for another reason.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path being accessed.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a volume carries neither an identifier nor a path.
    #[error("volume identifier or path required")]
    MissingVolumeReference,
    /// Raised when a volume identifier cannot be parsed.
    #[error("invalid volume identifier '{0}': expected storage:content/name")]
    InvalidVolumeId(String),
    /// Raised when a storage reference lacks a node or pool name.
    #[error("invalid storage reference: missing {0}")]
    InvalidStorage(String),
    /// Raised when no cluster member matches the requested node.
    #[error("node '{node}' not found in cluster membership")]
    NodeNotFound {
        /// Node name that was looked up.
        node: String,
    },
    /// Raised when the server-side task finishes unsuccessfully.
    #[error("task {upid} failed: {exit_status}")]
    TaskFailed {
        /// Task identifier.
        upid: String,
        /// Exit status reported by the server.
        exit_status: String,
    },
    /// Raised when a caller-driven wait exceeds its deadline.
    #[error("timeout waiting for task {upid}")]
    TaskTimeout {
        /// Task identifier.
        upid: String,
    },
    /// Wrapper for API client failures.
    #[error(transparent)]
    Transport(#[from] ApiError),
    /// Wrapper for secure copy failures.
    #[error(transparent)]
    Transfer(#[from] TransferError),
}
