//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which decouples the
//! transfer from whatever renders it (a terminal bar, a channel to a UI
//! thread, a test recorder). The engine never formats sizes, rates or times;
//! implementors derive those from the raw values passed here.

use crate::model::{ArchiveSummary, TransferProgress, TransferRequest, TransferResult};

/// Receives updates from [`crate::transfer::run_transfer`].
///
/// All methods are called synchronously on the thread running the transfer.
pub trait ProgressCallback: Send {
    /// Called once the preflight check has passed.
    fn on_validated(&self, _request: &TransferRequest, _summary: &ArchiveSummary) {}

    /// Called after both streams are open, before the first chunk.
    fn on_transfer_started(&self, _request: &TransferRequest, _total_bytes: u64) {}

    /// Called after every chunk that was fully written to the sink.
    ///
    /// `bytes_this_chunk` is the delta; `progress` holds the running totals.
    fn on_progress(&self, bytes_this_chunk: u64, progress: &TransferProgress);

    /// Called after the sink has been closed cleanly.
    fn on_transfer_completed(&self, _request: &TransferRequest, _result: &TransferResult) {}
}
