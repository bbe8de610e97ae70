//! Error types for the transfer engine.
//!
//! `TransferError` is the single error type surfaced by validation and
//! copying. Every variant maps to one [`ErrorKind`], the flat taxonomy callers
//! branch on. Sink platforms report their own failures as [`PlatformError`],
//! which the engine classifies without interpreting the message.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Flat classification of transfer failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The source is readable but is not a zip container
    MalformedArchive,
    /// Inspecting the archive failed for another reason
    ValidationFailure,
    /// The source path could not be found
    SourceUnavailable,
    /// Permission refused on source or sink
    AccessDenied,
    /// The sink path is a directory or otherwise not writable
    InvalidTarget,
    /// The sink platform reported a failure of its own
    SinkFailure,
    /// Any other read or write error
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::MalformedArchive => "malformed-archive",
            ErrorKind::ValidationFailure => "validation-failure",
            ErrorKind::SourceUnavailable => "source-unavailable",
            ErrorKind::AccessDenied => "access-denied",
            ErrorKind::InvalidTarget => "invalid-target",
            ErrorKind::SinkFailure => "sink-failure",
            ErrorKind::Io => "io-failure",
        };
        f.write_str(name)
    }
}

/// Errors produced while validating or transferring an archive.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("{} is not a valid zip file: {reason}", .path.display())]
    MalformedArchive { path: PathBuf, reason: String },

    #[error("failed to validate {}: {source}", .path.display())]
    ValidationFailure {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("no such file: {}", .path.display())]
    SourceUnavailable { path: PathBuf },

    #[error("permission denied: {}", .path.display())]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid target {}: {reason}", .path.display())]
    InvalidTarget { path: PathBuf, reason: &'static str },

    #[error("sink failure at {}: {message}", .path.display())]
    SinkFailure { path: PathBuf, message: String },

    #[error("{operation} failed for {}: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TransferError {
    /// The taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedArchive { .. } => ErrorKind::MalformedArchive,
            Self::ValidationFailure { .. } => ErrorKind::ValidationFailure,
            Self::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::InvalidTarget { .. } => ErrorKind::InvalidTarget,
            Self::SinkFailure { .. } => ErrorKind::SinkFailure,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// The path the failure is about.
    pub fn path(&self) -> &Path {
        match self {
            Self::MalformedArchive { path, .. }
            | Self::ValidationFailure { path, .. }
            | Self::SourceUnavailable { path }
            | Self::AccessDenied { path, .. }
            | Self::InvalidTarget { path, .. }
            | Self::SinkFailure { path, .. }
            | Self::Io { path, .. } => path,
        }
    }

    /// Classify an error raised while opening or reading the source.
    pub(crate) fn from_source_io(operation: &'static str, path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::SourceUnavailable {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => Self::AccessDenied {
                path: path.to_path_buf(),
                source: err,
            },
            _ => Self::Io {
                operation,
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// Classify an error raised by a sink during open, write or close.
    ///
    /// A [`PlatformError`] carried inside the `io::Error` wins over the
    /// io kind, so platform failures keep their meaning through `Write`.
    pub(crate) fn from_sink_io(operation: &'static str, path: &Path, err: io::Error) -> Self {
        let err = match err.downcast::<PlatformError>() {
            Ok(platform) => return Self::from_platform(path, platform),
            Err(err) => err,
        };

        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::AccessDenied {
                path: path.to_path_buf(),
                source: err,
            },
            io::ErrorKind::NotFound => Self::InvalidTarget {
                path: path.to_path_buf(),
                reason: "parent directory does not exist",
            },
            _ => Self::Io {
                operation,
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// Map a platform failure onto the taxonomy, one kind to one kind.
    pub fn from_platform(path: &Path, err: PlatformError) -> Self {
        let path = path.to_path_buf();
        match err.kind {
            PlatformErrorKind::PermissionDenied => Self::AccessDenied {
                path,
                source: io::Error::new(io::ErrorKind::PermissionDenied, err.message),
            },
            PlatformErrorKind::IsADirectory => Self::InvalidTarget {
                path,
                reason: "is a directory",
            },
            PlatformErrorKind::NotFound => Self::InvalidTarget {
                path,
                reason: "parent directory does not exist",
            },
            PlatformErrorKind::Other => Self::SinkFailure {
                path,
                message: err.message,
            },
        }
    }
}

/// What went wrong inside a sink platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorKind {
    NotFound,
    PermissionDenied,
    IsADirectory,
    Other,
}

/// A failure reported by a sink platform, carried through as-is.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PlatformError {
    pub kind: PlatformErrorKind,
    pub message: String,
}

impl PlatformError {
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        PlatformError {
            kind,
            message: message.into(),
        }
    }

    /// Wrap into an `io::Error` so it can travel through `Write`.
    pub fn into_io(self) -> io::Error {
        io::Error::other(self)
    }
}
