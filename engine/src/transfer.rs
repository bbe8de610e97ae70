//! Transfer orchestration.
//!
//! `run_transfer` sequences one upload:
//! - validate the local archive (nothing remote is touched if this fails)
//! - open the source file and the sink
//! - stream with the copy engine, timing from open to close
//!
//! Streams are owned locals here, so they are released on every exit path.

use std::fs::File;
use std::path::Path;
use std::time::Instant;

use tracing::{info, info_span, warn};

use crate::copy::{copy, CancelToken, CopyContext};
use crate::error::TransferError;
use crate::model::{
    CopyOptions, CopyOutcome, TransferOutcome, TransferProgress, TransferRequest, TransferResult,
};
use crate::platform::Platform;
use crate::preflight;
use crate::progress::ProgressCallback;

/// Open the local source for reading.
///
/// # Errors
/// `SourceUnavailable` if the file is gone, `AccessDenied` if it cannot be
/// read, `Io` otherwise.
pub fn open_source(path: &Path) -> Result<File, TransferError> {
    File::open(path).map_err(|e| TransferError::from_source_io("open source", path, e))
}

/// Validate `request.source_path`, then upload it to `request.sink_path` on
/// `platform`.
///
/// The byte count is not checked against the size seen during validation; a
/// mismatch is logged as a warning and the transfer still succeeds.
///
/// # Errors
/// Any [`TransferError`]. A failed transfer may leave a partial file at the
/// sink; it is not removed.
pub fn run_transfer(
    request: &TransferRequest,
    platform: &dyn Platform,
    options: CopyOptions,
    cancel: &CancelToken,
    progress_callback: Option<&dyn ProgressCallback>,
) -> Result<TransferOutcome, TransferError> {
    let span = info_span!(
        "transfer",
        id = %request.id,
        source = %request.source_path.display(),
        sink = %request.sink_path.display(),
        platform = platform.name(),
    );
    let _enter = span.enter();

    let summary = preflight::validate(&request.source_path)?;
    info!(
        entries = summary.entry_count,
        bytes = summary.total_bytes,
        "zip file validated"
    );
    if let Some(callback) = progress_callback {
        callback.on_validated(request, &summary);
    }

    let started = Instant::now();
    let mut source = open_source(&request.source_path)?;
    let mut sink = platform.open_sink(&request.sink_path)?;

    if let Some(callback) = progress_callback {
        callback.on_transfer_started(request, summary.total_bytes);
    }

    let ctx = CopyContext::new(&request.source_path, &request.sink_path, cancel)
        .with_options(options);
    let mut transferred = 0u64;
    let outcome = copy(
        &mut source,
        &mut sink,
        summary.total_bytes,
        |bytes_this_chunk| {
            transferred += bytes_this_chunk;
            if let Some(callback) = progress_callback {
                let progress = TransferProgress {
                    bytes_transferred: transferred,
                    total_bytes: summary.total_bytes,
                    elapsed_since_start: started.elapsed(),
                };
                callback.on_progress(bytes_this_chunk, &progress);
            }
        },
        &ctx,
    )?;

    let bytes_written = match outcome {
        CopyOutcome::Completed { bytes_written } => bytes_written,
        CopyOutcome::Cancelled { bytes_written } => {
            // Close normally so every reported chunk lands at the sink.
            sink.finish()?;
            let elapsed = started.elapsed();
            info!(bytes_written, "upload cancelled");
            return Ok(TransferOutcome::Cancelled {
                bytes_written,
                elapsed,
            });
        }
    };

    sink.finish()?;
    drop(source);
    let result = TransferResult {
        total_bytes: bytes_written,
        elapsed: started.elapsed(),
    };

    if bytes_written != summary.total_bytes {
        warn!(
            expected = summary.total_bytes,
            actual = bytes_written,
            "source size changed between validation and upload"
        );
    }
    info!(
        bytes = result.total_bytes,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "upload complete"
    );

    if let Some(callback) = progress_callback {
        callback.on_transfer_completed(request, &result);
    }

    Ok(TransferOutcome::Completed(result))
}
