//! Centralized error types for pst-harvest.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the pst-harvest library.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// The archive (or its root folder) could not be opened or read.
    #[error("Cannot access archive '{path}': {reason}")]
    ArchiveAccess { path: PathBuf, reason: String },

    /// The payload of a single attachment could not be read.
    #[error("Attachment {index} of message {email_id} could not be read: {reason}")]
    AttachmentRead {
        email_id: String,
        index: usize,
        reason: String,
    },

    /// The archive could not report how many attachments a message has.
    #[error("Attachment count unavailable for message {email_id}: {reason}")]
    AttachmentCount { email_id: String, reason: String },

    /// Building the record for one message failed.
    #[error("Failed to process message {email_id}: {reason}")]
    MessageProcessing { email_id: String, reason: String },

    /// A storage write failed; the whole batch was rolled back.
    #[error("Persistence error ({context}): {source}")]
    Persistence {
        context: String,
        source: rusqlite::Error,
    },

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, HarvestError>`.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a SQLite error with a short description of the failed step.
    pub fn persistence(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Persistence {
            context: context.into(),
            source,
        }
    }
}

/// Errors reported by an archive reader implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// The archive file could not be opened or parsed.
    #[error("cannot open archive: {0}")]
    Open(String),

    /// A structure inside the archive is damaged.
    #[error("corrupt archive data: {0}")]
    Corrupt(String),

    /// An attachment index outside `0..attachment_count` was requested.
    #[error("attachment index {0} out of range")]
    NoSuchAttachment(usize),

    /// The archive handle has already been closed.
    #[error("archive is closed")]
    Closed,
}
