//! tooldrop - upload a tools zip to a local or remote path.
//!
//! Thin adapter over the engine: parses arguments, runs the transfer on a
//! worker thread, renders progress on stderr and maps the outcome to an exit
//! code.

mod progress;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{unbounded, RecvTimeoutError};
use serde::Serialize;
use thiserror::Error;
use tooldrop_engine::{
    run_transfer, CancelToken, CopyOptions, ErrorKind, LocalPlatform, Platform, ShellPlatform,
    TransferError, TransferOutcome, TransferRequest, DEFAULT_CHUNK_SIZE,
};
use tracing::{debug, warn};

use crate::progress::{ChannelProgress, ProgressView};

/// How often the UI thread wakes up to check the timeout.
const TICK: Duration = Duration::from_millis(100);

/// tooldrop - upload a tools zip file to a remote host
#[derive(Parser, Debug)]
#[command(name = "tooldrop")]
#[command(version)]
#[command(about = "Validate a zip archive and upload it with progress reporting")]
struct Args {
    /// Local path to the tools zip
    #[arg(value_name = "LOCAL_ZIP", default_value = "tools.zip")]
    local_zip: PathBuf,

    /// Destination file path
    #[arg(value_name = "REMOTE_PATH", default_value = "/tmp/tools.zip")]
    remote_path: PathBuf,

    /// Command prefix used to reach the remote host, e.g. "ssh user@host".
    /// Without it the destination is a local path.
    #[arg(long, value_name = "COMMAND")]
    via: Option<String>,

    /// Bytes moved per chunk
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Cancel the upload after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print a JSON report on stdout
    #[arg(long)]
    json: bool,

    /// Hide the progress report
    #[arg(long, short)]
    quiet: bool,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("upload worker panicked")]
    WorkerPanicked,
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            CliError::WorkerPanicked => 1,
            CliError::Transfer(err) => exit_code_for(err.kind()),
        }
    }
}

const EXIT_CANCELLED: i32 = 130;

fn exit_code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Io => 1,
        ErrorKind::MalformedArchive | ErrorKind::ValidationFailure => 3,
        ErrorKind::SourceUnavailable => 4,
        ErrorKind::AccessDenied => 5,
        ErrorKind::InvalidTarget => 6,
        ErrorKind::SinkFailure => 7,
    }
}

#[derive(Debug, Serialize)]
struct JsonReport {
    status: &'static str,
    source: PathBuf,
    sink: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes_per_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl JsonReport {
    fn new(args: &Args, result: &Result<TransferOutcome, CliError>) -> Self {
        let mut report = JsonReport {
            status: "completed",
            source: args.local_zip.clone(),
            sink: args.remote_path.clone(),
            total_bytes: None,
            elapsed_secs: None,
            bytes_per_sec: None,
            error_kind: None,
            message: None,
        };
        match result {
            Ok(TransferOutcome::Completed(result)) => {
                report.total_bytes = Some(result.total_bytes);
                report.elapsed_secs = Some(result.elapsed.as_secs_f64());
                report.bytes_per_sec = Some(result.throughput());
            }
            Ok(TransferOutcome::Cancelled {
                bytes_written,
                elapsed,
            }) => {
                report.status = "cancelled";
                report.total_bytes = Some(*bytes_written);
                report.elapsed_secs = Some(elapsed.as_secs_f64());
            }
            Err(err) => {
                report.status = "failed";
                if let CliError::Transfer(transfer) = err {
                    report.error_kind = Some(transfer.kind().to_string());
                }
                report.message = Some(err.to_string());
            }
        }
        report
    }
}

fn init_tracing(verbose: bool, debug: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Parse arguments, run the upload, and exit with a code describing the outcome
fn main() {
    let args = Args::parse();
    init_tracing(args.verbose, args.debug);

    let result = run_cli(&args);

    if args.json {
        match serde_json::to_string_pretty(&JsonReport::new(&args, &result)) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: failed to encode report: {}", e),
        }
    }

    let exit_code = match result {
        Ok(TransferOutcome::Completed(_)) => 0,
        Ok(TransferOutcome::Cancelled { bytes_written, .. }) => {
            eprintln!(
                "upload cancelled after {} bytes; {} may be incomplete",
                bytes_written,
                args.remote_path.display()
            );
            EXIT_CANCELLED
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            err.exit_code()
        }
    };

    std::process::exit(exit_code);
}

fn build_platform(args: &Args) -> Result<Box<dyn Platform>, CliError> {
    match &args.via {
        None => Ok(Box::new(LocalPlatform)),
        Some(prefix) => ShellPlatform::from_prefix(prefix)
            .map(|platform| Box::new(platform) as Box<dyn Platform>)
            .ok_or_else(|| CliError::Usage("--via needs a command, e.g. \"ssh user@host\"".to_string())),
    }
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<TransferOutcome, CliError> {
    if args.chunk_size == 0 {
        return Err(CliError::Usage("--chunk-size must be at least 1".to_string()));
    }

    let request = TransferRequest::new(&args.local_zip, &args.remote_path)?;
    let platform = build_platform(args)?;
    let options = CopyOptions::with_chunk_size(args.chunk_size);
    let cancel = CancelToken::new();
    debug!(platform = platform.name(), chunk_size = args.chunk_size, "starting upload");

    let (tx, rx) = unbounded();
    let worker = {
        let request = request.clone();
        let cancel = cancel.clone();
        thread::spawn(move || {
            let callback = ChannelProgress::new(tx);
            run_transfer(&request, platform.as_ref(), options, &cancel, Some(&callback))
        })
    };

    let mut view = ProgressView::new(args.quiet, request.sink_path.display().to_string());
    let deadline = args
        .timeout
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    loop {
        match rx.recv_timeout(TICK) {
            Ok(update) => view.handle(update),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline && !cancel.is_cancelled() {
                warn!("timeout reached, cancelling upload");
                cancel.cancel();
            }
        }
    }

    let joined = worker.join();
    view.finish();

    let outcome = joined.map_err(|_| CliError::WorkerPanicked)??;
    Ok(outcome)
}
