//! Instrumented streaming copy.
//!
//! `copy` moves bytes from any `Read` to any `Write` through a single
//! fixed-size buffer, reporting each chunk only after the sink has accepted
//! all of it. The engine borrows both streams and never closes them; opening
//! and releasing them is the caller's job.
//!
//! Callers must not touch either stream from elsewhere while a copy is
//! running.

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::TransferError;
use crate::model::{CopyOptions, CopyOutcome};

/// Cooperative cancellation flag shared between a copy and its controller.
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask any copy observing this token to stop before its next chunk.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Where the streams handed to [`copy`] came from, and how to run the copy.
///
/// The paths are only used to label errors and log lines.
#[derive(Debug, Clone)]
pub struct CopyContext<'a> {
    pub source_path: &'a Path,
    pub sink_path: &'a Path,
    pub options: CopyOptions,
    pub cancel: &'a CancelToken,
}

impl<'a> CopyContext<'a> {
    pub fn new(source_path: &'a Path, sink_path: &'a Path, cancel: &'a CancelToken) -> Self {
        CopyContext {
            source_path,
            sink_path,
            options: CopyOptions::default(),
            cancel,
        }
    }

    pub fn with_options(mut self, options: CopyOptions) -> Self {
        self.options = options;
        self
    }
}

/// Copy `source` into `sink` chunk by chunk.
///
/// `on_progress` receives the size of each chunk once it is fully written.
/// `total_bytes` is informational only; a source shorter or longer than it is
/// copied to its real end without error.
///
/// The cancel token is checked before every read, so a cancelled copy has
/// written exactly the chunks it reported.
///
/// # Errors
/// Source failures map to `SourceUnavailable`/`AccessDenied`/`Io`, sink
/// failures to `AccessDenied`/`InvalidTarget`/`SinkFailure`/`Io`. Nothing is
/// retried, and bytes already written stay at the sink.
pub fn copy<R, W, F>(
    source: &mut R,
    sink: &mut W,
    total_bytes: u64,
    mut on_progress: F,
    ctx: &CopyContext<'_>,
) -> Result<CopyOutcome, TransferError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    F: FnMut(u64),
{
    let mut buffer = vec![0u8; ctx.options.chunk_size.max(1)];
    let mut bytes_written: u64 = 0;

    debug!(
        source = %ctx.source_path.display(),
        sink = %ctx.sink_path.display(),
        total_bytes,
        chunk_size = buffer.len(),
        "starting copy"
    );

    loop {
        if ctx.cancel.is_cancelled() {
            debug!(bytes_written, "copy cancelled");
            return Ok(CopyOutcome::Cancelled { bytes_written });
        }

        let read = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(TransferError::from_source_io("read source", ctx.source_path, e));
            }
        };

        // write_all loops over short writes and fails with WriteZero if the
        // sink stops accepting bytes.
        sink.write_all(&buffer[..read])
            .map_err(|e| TransferError::from_sink_io("write sink", ctx.sink_path, e))?;

        bytes_written += read as u64;
        trace!(chunk = read, bytes_written, "chunk written");
        on_progress(read as u64);
    }

    sink.flush()
        .map_err(|e| TransferError::from_sink_io("flush sink", ctx.sink_path, e))?;

    debug!(bytes_written, "copy finished");
    Ok(CopyOutcome::Completed { bytes_written })
}
