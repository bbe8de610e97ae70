use std::path::PathBuf;

use crossbeam_channel::Sender;
use indicatif::style::TemplateError;
use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressStyle};
use tooldrop_engine::{
    ArchiveSummary, ProgressCallback, TransferProgress, TransferRequest, TransferResult,
};

#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    Validated {
        source: PathBuf,
        summary: ArchiveSummary,
    },
    Started {
        total_bytes: u64,
    },
    Progress {
        progress: TransferProgress,
    },
    Completed {
        sink: PathBuf,
        result: TransferResult,
    },
}

/// A ProgressCallback implementation that forwards updates to the UI thread.
pub struct ChannelProgress {
    sender: Sender<ProgressUpdate>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<ProgressUpdate>) -> Self {
        ChannelProgress { sender }
    }
}

impl ProgressCallback for ChannelProgress {
    fn on_validated(&self, request: &TransferRequest, summary: &ArchiveSummary) {
        let _ = self.sender.send(ProgressUpdate::Validated {
            source: request.source_path.clone(),
            summary: summary.clone(),
        });
    }

    fn on_transfer_started(&self, _request: &TransferRequest, total_bytes: u64) {
        let _ = self.sender.send(ProgressUpdate::Started { total_bytes });
    }

    fn on_progress(&self, _bytes_this_chunk: u64, progress: &TransferProgress) {
        let _ = self.sender.send(ProgressUpdate::Progress {
            progress: *progress,
        });
    }

    fn on_transfer_completed(&self, request: &TransferRequest, result: &TransferResult) {
        let _ = self.sender.send(ProgressUpdate::Completed {
            sink: request.sink_path.clone(),
            result: *result,
        });
    }
}

/// Renders updates on stderr: the preflight report, a progress bar, and the
/// completion line.
pub struct ProgressView {
    quiet: bool,
    label: String,
    bar: Option<ProgressBar>,
}

impl ProgressView {
    pub fn new(quiet: bool, label: String) -> Self {
        ProgressView {
            quiet,
            label,
            bar: None,
        }
    }

    pub fn handle(&mut self, update: ProgressUpdate) {
        if self.quiet {
            return;
        }

        match update {
            ProgressUpdate::Validated { source, summary } => {
                eprintln!("validating zip file: {}", source.display());
                eprintln!(
                    "zip contains {} files: {}{}",
                    summary.entry_count,
                    summary.sample_entries.join(", "),
                    if summary.has_more_entries() { "..." } else { "" }
                );
                eprintln!("zip file size: {}", HumanBytes(summary.total_bytes));
            }
            ProgressUpdate::Started { total_bytes } => {
                let bar = ProgressBar::new(total_bytes);
                bar.set_style(bar_style().unwrap_or_else(|_| ProgressStyle::default_bar()));
                bar.set_prefix(self.label.clone());
                bar.set_message(format!("{:>5.1}%", 0.0));
                self.bar = Some(bar);
            }
            ProgressUpdate::Progress { progress } => {
                if let Some(bar) = &self.bar {
                    bar.set_position(progress.bytes_transferred);
                    bar.set_message(percent_label(&progress));
                }
            }
            ProgressUpdate::Completed { sink, result } => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }
                eprintln!(
                    "uploaded {} in {} to {} ({}/s)",
                    HumanBytes(result.total_bytes),
                    HumanDuration(result.elapsed),
                    sink.display(),
                    HumanBytes(result.throughput() as u64)
                );
            }
        }
    }

    /// Clear any bar left behind by a failed or cancelled transfer.
    pub fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }
}

// Rate and ETA come from indicatif's windowed estimator, not the
// since-start average in `TransferProgress`.
fn bar_style() -> Result<ProgressStyle, TemplateError> {
    Ok(ProgressStyle::with_template(
        "{prefix:.cyan.bold} [{wide_bar:.cyan/blue}] {msg} • {bytes}/{total_bytes} • {binary_bytes_per_sec} • ETA {eta}",
    )?
    .progress_chars("=> "))
}

fn percent_label(progress: &TransferProgress) -> String {
    format!("{:>5.1}%", progress.fraction() * 100.0)
}
