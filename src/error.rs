//! Error types for ocd.

use crate::models::operation::OperationKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`], for callers that branch on the
/// failure rather than on its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A safety or path check failed before any mutation.
    Validation,
    /// The destination is occupied and may not be overwritten.
    Conflict,
    /// The source of a move, copy or rename does not exist.
    NotFound,
    /// The underlying OS call failed during execution.
    Filesystem,
    /// A history record could not be inverted.
    Rollback,
    /// Configuration or input files could not be read.
    Config,
    Other,
}

/// Main error type for ocd.
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors
    #[error("{op} rejected for {}: {reason}", .path.display())]
    Validation {
        op: OperationKind,
        path: PathBuf,
        reason: String,
    },

    #[error("{op} not permitted for {}: {reason}", .path.display())]
    PermissionDenied {
        op: OperationKind,
        path: PathBuf,
        reason: String,
    },

    #[error("Batch of {size} operations exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    // Conflict errors
    #[error("{op} blocked, path already occupied: {}", .path.display())]
    PathConflict { op: OperationKind, path: PathBuf },

    // Not-found errors
    #[error("{op} failed, source not found: {}", .path.display())]
    SourceNotFound { op: OperationKind, path: PathBuf },

    // Execution errors
    #[error(
        "{op} failed on {}{}: {source}{}",
        .path.display(),
        arrow(.destination),
        partial_note(.partial_side_effect)
    )]
    Filesystem {
        op: OperationKind,
        path: PathBuf,
        destination: Option<PathBuf>,
        partial_side_effect: bool,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} failed on {}: {reason}", .path.display())]
    ChecksumMismatch {
        op: OperationKind,
        path: PathBuf,
        reason: String,
    },

    // Rollback errors
    #[error("Rollback of {op} failed for {}: {reason}", .path.display())]
    Rollback {
        op: OperationKind,
        path: PathBuf,
        reason: String,
    },

    // Input errors
    #[error("Invalid plan file: {0}")]
    InvalidPlanFile(String),

    #[error("Invalid journal file: {0}")]
    InvalidJournalFile(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

fn arrow(destination: &Option<PathBuf>) -> String {
    destination
        .as_ref()
        .map(|d| format!(" -> {}", d.display()))
        .unwrap_or_default()
}

fn partial_note(partial: &bool) -> &'static str {
    if *partial {
        " (partial side effect left in place)"
    } else {
        ""
    }
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Wrap an OS error with the operation and path that triggered it.
    pub fn filesystem(op: OperationKind, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            op,
            path: path.into(),
            destination: None,
            partial_side_effect: false,
            source,
        }
    }

    /// Create a validation error.
    pub fn validation(op: OperationKind, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Validation {
            op,
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a rollback error.
    pub fn rollback(op: OperationKind, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Rollback {
            op,
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. }
            | Error::PermissionDenied { .. }
            | Error::BatchTooLarge { .. } => ErrorKind::Validation,
            Error::PathConflict { .. } => ErrorKind::Conflict,
            Error::SourceNotFound { .. } => ErrorKind::NotFound,
            Error::Filesystem { .. } | Error::ChecksumMismatch { .. } | Error::Io(_) => {
                ErrorKind::Filesystem
            }
            Error::Rollback { .. } => ErrorKind::Rollback,
            Error::InvalidPlanFile(_)
            | Error::InvalidJournalFile(_)
            | Error::Json(_) => ErrorKind::Config,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    /// The operation that raised this error, if it came from the manager.
    pub fn operation(&self) -> Option<OperationKind> {
        match self {
            Error::Validation { op, .. }
            | Error::PermissionDenied { op, .. }
            | Error::PathConflict { op, .. }
            | Error::SourceNotFound { op, .. }
            | Error::Filesystem { op, .. }
            | Error::ChecksumMismatch { op, .. }
            | Error::Rollback { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// The path that triggered this error, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Error::Validation { path, .. }
            | Error::PermissionDenied { path, .. }
            | Error::PathConflict { path, .. }
            | Error::SourceNotFound { path, .. }
            | Error::Filesystem { path, .. }
            | Error::ChecksumMismatch { path, .. }
            | Error::Rollback { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Whether a filesystem side effect may have been left behind.
    pub fn partial_side_effect(&self) -> bool {
        matches!(
            self,
            Error::Filesystem {
                partial_side_effect: true,
                ..
            }
        )
    }

    /// Whether the caller can recover by changing its request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Conflict | ErrorKind::NotFound
        )
    }
}
