//! Error types for memspace.
//!
//! This module provides a unified error type [`MemspaceError`] for every
//! namespace, session and RPC operation, along with a convenient [`Result`]
//! type alias.
//!
//! # Error Categories
//!
//! - **Namespace**: the request was invalid against the current namespace
//!   (missing file, existing file, malformed path, wrong file state).
//! - **Under storage**: the underlying storage system failed. These are kept in
//!   their own variant so callers can tell "the request was invalid" apart from
//!   "the storage below us broke".
//! - **Ambient**: configuration, network and serialization failures.
//!
//! # Example
//!
//! ```rust
//! use memspace::error::{MemspaceError, Result};
//!
//! fn open(path: &str) -> Result<()> {
//!     if path.is_empty() {
//!         return Err(MemspaceError::InvalidPath("open: path cannot be empty".into()));
//!     }
//!     Ok(())
//! }
//!
//! let err = open("").unwrap_err();
//! assert!(!err.is_retryable());
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Main error type for memspace operations.
#[derive(Error, Debug)]
pub enum MemspaceError {
    // Namespace errors
    #[error("File does not exist: {0}")]
    FileDoesNotExist(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("Invalid file size: {0}")]
    InvalidFileSize(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Mount point conflict: {0}")]
    MountPointConflict(String),

    #[error("Block info unavailable: {0}")]
    BlockInfoUnavailable(String),

    // Under storage errors
    #[error("Under storage failure ({context}): {source}")]
    StorageIo {
        context: String,
        #[source]
        source: io::Error,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // Local errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable, serializable classification of a [`MemspaceError`].
///
/// This is what crosses the wire; the message travels alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FileDoesNotExist,
    FileAlreadyExists,
    InvalidPath,
    DirectoryNotEmpty,
    InvalidFileSize,
    InvalidState,
    MountPointConflict,
    BlockInfoUnavailable,
    StorageIo,
    Config,
    Network,
    Serialization,
    Io,
    Internal,
}

impl MemspaceError {
    /// Wrap an error raised by the under file system.
    pub fn storage(context: impl Into<String>, source: io::Error) -> Self {
        MemspaceError::StorageIo {
            context: context.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MemspaceError::FileDoesNotExist(_) => ErrorKind::FileDoesNotExist,
            MemspaceError::FileAlreadyExists(_) => ErrorKind::FileAlreadyExists,
            MemspaceError::InvalidPath(_) => ErrorKind::InvalidPath,
            MemspaceError::DirectoryNotEmpty(_) => ErrorKind::DirectoryNotEmpty,
            MemspaceError::InvalidFileSize(_) => ErrorKind::InvalidFileSize,
            MemspaceError::InvalidState(_) => ErrorKind::InvalidState,
            MemspaceError::MountPointConflict(_) => ErrorKind::MountPointConflict,
            MemspaceError::BlockInfoUnavailable(_) => ErrorKind::BlockInfoUnavailable,
            MemspaceError::StorageIo { .. } => ErrorKind::StorageIo,
            MemspaceError::Config(_) | MemspaceError::InvalidConfig { .. } => ErrorKind::Config,
            MemspaceError::Network(_) => ErrorKind::Network,
            MemspaceError::Serialization(_) | MemspaceError::Deserialization(_) => {
                ErrorKind::Serialization
            }
            MemspaceError::Io(_) => ErrorKind::Io,
            MemspaceError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The message without the category prefix, as sent over the wire.
    pub fn detail(&self) -> String {
        match self {
            MemspaceError::FileDoesNotExist(m)
            | MemspaceError::FileAlreadyExists(m)
            | MemspaceError::InvalidPath(m)
            | MemspaceError::DirectoryNotEmpty(m)
            | MemspaceError::InvalidFileSize(m)
            | MemspaceError::InvalidState(m)
            | MemspaceError::MountPointConflict(m)
            | MemspaceError::BlockInfoUnavailable(m)
            | MemspaceError::Config(m)
            | MemspaceError::Network(m)
            | MemspaceError::Serialization(m)
            | MemspaceError::Deserialization(m)
            | MemspaceError::Internal(m) => m.clone(),
            MemspaceError::StorageIo { context, source } => format!("{}: {}", context, source),
            MemspaceError::InvalidConfig { field, reason } => format!("{}: {}", field, reason),
            MemspaceError::Io(e) => e.to_string(),
        }
    }

    /// Check if error is retryable.
    ///
    /// Namespace mutations are not idempotent, so only transport failures
    /// qualify. Under storage failures are opaque and never retried by default.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MemspaceError::Network(_))
    }

    /// Rebuild an error received over the wire.
    pub fn from_wire(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::FileDoesNotExist => MemspaceError::FileDoesNotExist(message),
            ErrorKind::FileAlreadyExists => MemspaceError::FileAlreadyExists(message),
            ErrorKind::InvalidPath => MemspaceError::InvalidPath(message),
            ErrorKind::DirectoryNotEmpty => MemspaceError::DirectoryNotEmpty(message),
            ErrorKind::InvalidFileSize => MemspaceError::InvalidFileSize(message),
            ErrorKind::InvalidState => MemspaceError::InvalidState(message),
            ErrorKind::MountPointConflict => MemspaceError::MountPointConflict(message),
            ErrorKind::BlockInfoUnavailable => MemspaceError::BlockInfoUnavailable(message),
            ErrorKind::StorageIo => MemspaceError::StorageIo {
                context: "remote".to_string(),
                source: io::Error::other(message),
            },
            ErrorKind::Config => MemspaceError::Config(message),
            ErrorKind::Network => MemspaceError::Network(message),
            ErrorKind::Serialization => MemspaceError::Serialization(message),
            ErrorKind::Io => MemspaceError::Io(io::Error::other(message)),
            ErrorKind::Internal => MemspaceError::Internal(message),
        }
    }
}

impl From<serde_json::Error> for MemspaceError {
    fn from(e: serde_json::Error) -> Self {
        MemspaceError::Serialization(e.to_string())
    }
}

/// Result type alias for memspace operations.
pub type Result<T> = std::result::Result<T, MemspaceError>;
