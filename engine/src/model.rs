//! Core data model for transfers.
//!
//! This module defines the values that flow through a single upload:
//! - TransferRequest: what to upload and where
//! - ArchiveSummary: what the preflight validator found
//! - TransferProgress / TransferResult: what the copy produced
//! - CopyOptions: tuning knobs for the copy engine

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::error::TransferError;

/// Default number of bytes moved per chunk (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Number of entry names kept in an [`ArchiveSummary`] for display.
pub const SAMPLE_ENTRY_LIMIT: usize = 5;

/// A single upload: a local archive and the sink path it should land at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Unique identifier, used to tag log output for this transfer
    pub id: Uuid,

    /// Local archive to upload
    pub source_path: PathBuf,

    /// Destination path on the sink platform
    pub sink_path: PathBuf,
}

impl TransferRequest {
    /// Create a request, rejecting empty paths.
    ///
    /// # Errors
    /// `SourceUnavailable` for an empty source path, `InvalidTarget` for an
    /// empty sink path.
    pub fn new<S: AsRef<Path>, D: AsRef<Path>>(
        source: S,
        sink: D,
    ) -> Result<Self, TransferError> {
        let source = source.as_ref();
        let sink = sink.as_ref();

        if source.as_os_str().is_empty() {
            return Err(TransferError::SourceUnavailable {
                path: source.to_path_buf(),
            });
        }
        if sink.as_os_str().is_empty() {
            return Err(TransferError::InvalidTarget {
                path: sink.to_path_buf(),
                reason: "sink path is empty",
            });
        }

        Ok(TransferRequest {
            id: Uuid::new_v4(),
            source_path: source.to_path_buf(),
            sink_path: sink.to_path_buf(),
        })
    }
}

/// What the preflight validator learned about an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    /// Number of entries in the archive's central directory
    pub entry_count: usize,

    /// On-disk size of the archive file in bytes
    pub total_bytes: u64,

    /// The first few entry names, in archive order
    pub sample_entries: Vec<String>,
}

impl ArchiveSummary {
    /// True when `sample_entries` does not list every entry.
    pub fn has_more_entries(&self) -> bool {
        self.entry_count > self.sample_entries.len()
    }
}

/// A point-in-time view of a running transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes confirmed written to the sink so far
    pub bytes_transferred: u64,

    /// Expected size of the source
    pub total_bytes: u64,

    /// Time since the transfer streams were opened
    pub elapsed_since_start: Duration,
}

impl TransferProgress {
    /// Completed fraction in `0.0..=1.0`. An empty source counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes_transferred as f64 / self.total_bytes as f64).min(1.0)
    }

    /// Average rate in bytes per second since the start.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed_since_start.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.bytes_transferred as f64 / secs
    }

    /// Estimated time remaining, or `None` while no rate is known yet.
    pub fn eta(&self) -> Option<Duration> {
        let rate = self.rate();
        if rate <= 0.0 {
            return None;
        }
        let remaining = self.total_bytes.saturating_sub(self.bytes_transferred);
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }
}

/// Final figures for a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    /// Bytes written to the sink
    pub total_bytes: u64,

    /// Wall time from opening the streams to closing the sink
    pub elapsed: Duration,
}

impl TransferResult {
    /// Throughput in bytes per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return self.total_bytes as f64;
        }
        self.total_bytes as f64 / secs
    }
}

/// How a call to [`crate::copy::copy`] ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The source reached end-of-stream
    Completed { bytes_written: u64 },
    /// The cancel token was tripped between chunks
    Cancelled { bytes_written: u64 },
}

impl CopyOutcome {
    /// Bytes committed to the sink, whichever way the copy ended.
    pub fn bytes_written(&self) -> u64 {
        match self {
            CopyOutcome::Completed { bytes_written } | CopyOutcome::Cancelled { bytes_written } => {
                *bytes_written
            }
        }
    }
}

/// How a whole transfer ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Every source byte reached the sink and the sink closed cleanly
    Completed(TransferResult),
    /// The caller cancelled; the sink may hold a partial artifact
    Cancelled { bytes_written: u64, elapsed: Duration },
}

/// Tuning knobs for the copy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOptions {
    /// Upper bound on bytes read per chunk; this is the engine's peak buffer size
    pub chunk_size: usize,
}

impl CopyOptions {
    /// Options with the given chunk size. Zero is raised to one byte.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        CopyOptions {
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Default for CopyOptions {
    fn default() -> Self {
        CopyOptions {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}
