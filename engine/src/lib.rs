//! # tooldrop engine - archive upload library
//!
//! Validates a local zip archive and streams it to a destination with
//! progress reporting. Designed to sit under any front end (CLI, GUI,
//! automation).
//!
//! ## Overview
//!
//! - Preflight validation of the archive before anything remote is opened
//! - A chunked copy engine with bounded memory, per-chunk progress and
//!   cooperative cancellation
//! - Pluggable sink platforms (local filesystem, shell pipe to a remote host)
//! - One flat error taxonomy for every failure, whatever the sink
//!
//! ## Basic Usage
//!
//! ```no_run
//! use tooldrop_engine::{
//!     run_transfer, CancelToken, CopyOptions, LocalPlatform, TransferOutcome, TransferRequest,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let request = TransferRequest::new("tools.zip", "/tmp/tools.zip")?;
//! let outcome = run_transfer(
//!     &request,
//!     &LocalPlatform,
//!     CopyOptions::default(),
//!     &CancelToken::new(),
//!     None,
//! )?;
//!
//! if let TransferOutcome::Completed(result) = outcome {
//!     println!("{} bytes in {:?}", result.total_bytes, result.elapsed);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (TransferRequest, ArchiveSummary, outcomes)
//! - **error**: Error taxonomy
//! - **preflight**: Zip archive validation
//! - **copy**: The instrumented streaming copy and its cancel token
//! - **platform**: Sink platforms
//! - **progress**: Progress callback trait
//! - **transfer**: Orchestration (validate, open, copy, close)

pub mod model;
pub mod error;
pub mod preflight;
pub mod copy;
pub mod platform;
pub mod progress;
pub mod transfer;

// Re-export main types and functions
pub use model::{
    ArchiveSummary, CopyOptions, CopyOutcome, TransferOutcome, TransferProgress, TransferRequest,
    TransferResult, DEFAULT_CHUNK_SIZE, SAMPLE_ENTRY_LIMIT,
};
pub use error::{ErrorKind, PlatformError, PlatformErrorKind, TransferError};
pub use preflight::validate;
pub use copy::{copy, CancelToken, CopyContext};
pub use platform::{LocalPlatform, Platform, ShellPlatform, SinkStream};
pub use progress::ProgressCallback;
pub use transfer::{open_source, run_transfer};
