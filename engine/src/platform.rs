//! Sink platforms.
//!
//! A [`Platform`] knows how to open a writable stream at a destination path.
//! The copy engine only sees the resulting [`SinkStream`] as a `Write`; any
//! failure the platform reports comes back through the error taxonomy.
//!
//! Two platforms ship with the engine:
//! - `LocalPlatform` writes to the local filesystem
//! - `ShellPlatform` pipes bytes into `cat` on another host reached through a
//!   command prefix such as `ssh user@host`

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::error::{PlatformError, PlatformErrorKind, TransferError};

/// A destination that can hand out writable streams.
pub trait Platform: Send + Sync {
    /// Short name for log output.
    fn name(&self) -> &str;

    /// Open `path` for writing, truncating anything already there.
    ///
    /// # Errors
    /// `AccessDenied`, `InvalidTarget` or `SinkFailure` depending on what the
    /// platform reports.
    fn open_sink(&self, path: &Path) -> Result<Box<dyn SinkStream>, TransferError>;
}

/// An open sink. Dropping it releases the underlying resource; `finish`
/// releases it and reports failures that only show up on close.
pub trait SinkStream: Write + Send {
    fn finish(self: Box<Self>) -> Result<(), TransferError>;
}

/// Writes to the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPlatform;

impl Platform for LocalPlatform {
    fn name(&self) -> &str {
        "local"
    }

    fn open_sink(&self, path: &Path) -> Result<Box<dyn SinkStream>, TransferError> {
        if let Ok(metadata) = fs::metadata(path) {
            if metadata.is_dir() {
                return Err(TransferError::InvalidTarget {
                    path: path.to_path_buf(),
                    reason: "is a directory",
                });
            }
        }

        let file = File::create(path)
            .map_err(|e| TransferError::from_sink_io("open sink", path, e))?;
        debug!(path = %path.display(), "opened local sink");

        Ok(Box::new(LocalSink {
            path: path.to_path_buf(),
            file,
        }))
    }
}

struct LocalSink {
    path: PathBuf,
    file: File,
}

impl Write for LocalSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl SinkStream for LocalSink {
    fn finish(self: Box<Self>) -> Result<(), TransferError> {
        let LocalSink { path, file } = *self;
        file.sync_all()
            .map_err(|e| TransferError::from_sink_io("close sink", &path, e))?;
        debug!(path = %path.display(), "closed local sink");
        Ok(())
    }
}

// Exit codes of the probe script run before streaming to a shell sink.
const PROBE_IS_DIRECTORY: i32 = 21;
const PROBE_NO_PARENT: i32 = 22;
const PROBE_NOT_WRITABLE: i32 = 23;

/// Streams into `cat` through a command prefix, e.g. `ssh user@host` or
/// `sh -c`. The destination command is appended as a single argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellPlatform {
    program: String,
    args: Vec<String>,
}

impl ShellPlatform {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ShellPlatform {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from a whitespace-separated prefix such as `"ssh -p 2222 host"`.
    /// Returns `None` for an empty prefix.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        let mut words = prefix.split_whitespace();
        let program = words.next()?;
        Some(Self::new(program, words))
    }

    fn command(&self, script: String) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(script);
        command
    }

    fn spawn_failure(&self, path: &Path, err: io::Error) -> TransferError {
        TransferError::SinkFailure {
            path: path.to_path_buf(),
            message: format!("failed to run {}: {}", self.program, err),
        }
    }

    /// Check the destination before streaming so directory and permission
    /// problems surface at open time.
    fn probe(&self, path: &Path) -> Result<(), TransferError> {
        let quoted = shell_quote(path);
        let script = format!(
            "if [ -d {q} ]; then exit {dir}; fi; \
             if [ ! -d \"$(dirname {q})\" ]; then exit {parent}; fi; \
             : >> {q} 2>/dev/null || exit {denied}",
            q = quoted,
            dir = PROBE_IS_DIRECTORY,
            parent = PROBE_NO_PARENT,
            denied = PROBE_NOT_WRITABLE,
        );

        let output = self
            .command(script)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_failure(path, e))?;

        let kind = match output.status.code() {
            Some(0) => return Ok(()),
            Some(PROBE_IS_DIRECTORY) => PlatformErrorKind::IsADirectory,
            Some(PROBE_NO_PARENT) => PlatformErrorKind::NotFound,
            Some(PROBE_NOT_WRITABLE) => PlatformErrorKind::PermissionDenied,
            _ => PlatformErrorKind::Other,
        };
        let message = describe_exit(&self.program, output.status.code(), &output.stderr);
        Err(TransferError::from_platform(path, PlatformError::new(kind, message)))
    }
}

impl Platform for ShellPlatform {
    fn name(&self) -> &str {
        &self.program
    }

    fn open_sink(&self, path: &Path) -> Result<Box<dyn SinkStream>, TransferError> {
        self.probe(path)?;

        let mut child = self
            .command(format!("cat > {}", shell_quote(path)))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_failure(path, e))?;

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(TransferError::SinkFailure {
                path: path.to_path_buf(),
                message: "child process has no stdin".to_string(),
            });
        };
        // Drained while streaming; a chatty prefix must not stall on a full pipe.
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut captured = Vec::new();
                let _ = pipe.read_to_end(&mut captured);
                captured
            })
        });
        debug!(path = %path.display(), program = %self.program, "opened shell sink");

        Ok(Box::new(ShellSink {
            path: path.to_path_buf(),
            program: self.program.clone(),
            stdin: Some(stdin),
            child: Some(child),
            stderr,
        }))
    }
}

struct ShellSink {
    path: PathBuf,
    program: String,
    stdin: Option<ChildStdin>,
    child: Option<Child>,
    stderr: Option<JoinHandle<Vec<u8>>>,
}

impl ShellSink {
    fn closed() -> io::Error {
        PlatformError::new(PlatformErrorKind::Other, "sink already closed").into_io()
    }

    /// Send EOF and wait for the command to exit. Returns a description of
    /// the exit when it failed.
    fn reap(&mut self) -> io::Result<Option<String>> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };

        let status = child.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        if status.success() {
            Ok(None)
        } else {
            Ok(Some(describe_exit(&self.program, status.code(), &stderr)))
        }
    }
}

impl Write for ShellSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let stdin = self.stdin.as_mut().ok_or_else(Self::closed)?;
        match stdin.write(buf) {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                // The remote side went away; report why it exited.
                let message = match self.reap() {
                    Ok(Some(exit)) => format!("stream closed early: {exit}"),
                    Ok(None) => format!("{} closed the stream early", self.program),
                    Err(e) => format!("failed to wait for {}: {}", self.program, e),
                };
                Err(PlatformError::new(PlatformErrorKind::Other, message).into_io())
            }
            other => other,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.flush(),
            None => Ok(()),
        }
    }
}

impl SinkStream for ShellSink {
    fn finish(mut self: Box<Self>) -> Result<(), TransferError> {
        let message = match self.reap() {
            Ok(None) => {
                debug!(path = %self.path.display(), "closed shell sink");
                return Ok(());
            }
            Ok(Some(exit)) => exit,
            Err(e) => format!("failed to wait for {}: {}", self.program, e),
        };
        Err(TransferError::SinkFailure {
            path: self.path.clone(),
            message,
        })
    }
}

/// Abandons the command without waiting for it to drain its input. The
/// stderr reader is left to finish on its own once the pipe closes.
impl Drop for ShellSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn describe_exit(program: &str, code: Option<i32>, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    let status = match code {
        Some(code) => format!("{program} exited with status {code}"),
        None => format!("{program} was terminated by a signal"),
    };
    if stderr.is_empty() {
        status
    } else {
        format!("{status}: {stderr}")
    }
}

/// Single-quote a path for a POSIX shell.
fn shell_quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_local_sink_writes_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("tools.zip");

        let mut sink = LocalPlatform.open_sink(&path).expect("Failed to open sink");
        sink.write_all(b"payload").expect("Failed to write");
        sink.finish().expect("Failed to finish");

        assert_eq!(fs::read(&path).unwrap(), b"payload");
    }

    #[test]
    fn test_local_sink_truncates_existing_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("tools.zip");
        fs::write(&path, b"old contents that are longer").unwrap();

        let mut sink = LocalPlatform.open_sink(&path).expect("Failed to open sink");
        sink.write_all(b"new").unwrap();
        sink.finish().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_local_directory_is_invalid_target() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = LocalPlatform.open_sink(temp_dir.path()).err().expect("open should fail");
        assert_eq!(err.kind(), ErrorKind::InvalidTarget);
    }

    #[test]
    fn test_local_missing_parent_is_invalid_target() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("missing").join("tools.zip");
        let err = LocalPlatform.open_sink(&path).err().expect("open should fail");
        assert_eq!(err.kind(), ErrorKind::InvalidTarget);
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote(Path::new("/tmp/it's.zip")), r"'/tmp/it'\''s.zip'");
        assert_eq!(shell_quote(Path::new("/tmp/a b.zip")), "'/tmp/a b.zip'");
    }

    #[test]
    fn test_from_prefix_splits_words() {
        let platform = ShellPlatform::from_prefix("ssh -p 2222 user@host").unwrap();
        assert_eq!(platform, ShellPlatform::new("ssh", ["-p", "2222", "user@host"]));
        assert!(ShellPlatform::from_prefix("   ").is_none());
    }

    #[test]
    fn test_describe_exit_includes_stderr() {
        assert_eq!(
            describe_exit("ssh", Some(255), b"Connection refused\n"),
            "ssh exited with status 255: Connection refused"
        );
        assert_eq!(describe_exit("sh", None, b""), "sh was terminated by a signal");
    }

    #[cfg(unix)]
    mod shell {
        use super::*;

        fn local_shell() -> ShellPlatform {
            ShellPlatform::new("sh", ["-c"])
        }

        #[test]
        fn test_shell_sink_streams_bytes() {
            let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = temp_dir.path().join("it's here.zip");

            let mut sink = local_shell().open_sink(&path).expect("Failed to open sink");
            sink.write_all(&[7u8; 100_000]).expect("Failed to write");
            sink.finish().expect("Failed to finish");

            assert_eq!(fs::read(&path).unwrap(), vec![7u8; 100_000]);
        }

        #[test]
        fn test_shell_directory_is_invalid_target() {
            let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
            let err = local_shell().open_sink(temp_dir.path()).err().expect("open should fail");
            assert_eq!(err.kind(), ErrorKind::InvalidTarget);
        }

        #[test]
        fn test_shell_missing_parent_is_invalid_target() {
            let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = temp_dir.path().join("nope").join("tools.zip");
            let err = local_shell().open_sink(&path).err().expect("open should fail");
            assert_eq!(err.kind(), ErrorKind::InvalidTarget);
        }

        #[test]
        fn test_missing_program_is_sink_failure() {
            let platform = ShellPlatform::new("definitely-not-a-real-program-7f3a", Vec::<String>::new());
            let err = platform.open_sink(Path::new("/tmp/tools.zip")).err().expect("open should fail");
            assert_eq!(err.kind(), ErrorKind::SinkFailure);
        }

        #[test]
        fn test_failing_remote_command_is_sink_failure() {
            let platform = ShellPlatform::new("sh", ["-c", "echo refused >&2; exit 9", "--"]);
            let err = platform.open_sink(Path::new("/tmp/tools.zip")).err().expect("open should fail");
            assert_eq!(err.kind(), ErrorKind::SinkFailure);
            assert!(err.to_string().contains("refused"));
        }

        // Passes the open-time check, then runs `stream` in place of `cat`.
        fn scripted_shell(stream: &str) -> ShellPlatform {
            let script = format!("case \"$1\" in cat*) {stream} ;; *) exit 0 ;; esac");
            ShellPlatform::new("sh", ["-c".to_string(), script, "--".to_string()])
        }

        #[test]
        fn test_remote_exit_midstream_is_sink_failure() {
            let path = Path::new("/tmp/tools.zip");
            let platform =
                scripted_shell("head -c 1000 >/dev/null; echo remote gave up >&2; exit 3");

            let mut sink = platform.open_sink(path).expect("Failed to open sink");
            let io_err = sink.write_all(&vec![1u8; 1 << 20]).unwrap_err();
            let err = TransferError::from_sink_io("write sink", path, io_err);

            assert_eq!(err.kind(), ErrorKind::SinkFailure);
            let message = err.to_string();
            assert!(message.contains("status 3"), "{message}");
            assert!(message.contains("remote gave up"), "{message}");
        }

        #[test]
        fn test_nonzero_exit_on_finish_is_sink_failure() {
            let platform = scripted_shell("cat >/dev/null; echo disk full >&2; exit 4");

            let mut sink = platform
                .open_sink(Path::new("/tmp/tools.zip"))
                .expect("Failed to open sink");
            sink.write_all(b"payload").expect("Failed to write");
            let err = sink.finish().unwrap_err();

            assert_eq!(err.kind(), ErrorKind::SinkFailure);
            assert!(err.to_string().contains("disk full"));
        }

        #[test]
        fn test_noisy_stderr_does_not_stall_stream() {
            let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = temp_dir.path().join("tools.zip");
            let platform = scripted_shell(&format!(
                "head -c 200000 /dev/zero | tr '\\0' x >&2; cat > {}",
                shell_quote(&path)
            ));

            let mut sink = platform.open_sink(&path).expect("Failed to open sink");
            sink.write_all(&[9u8; 300_000]).expect("Failed to write");
            sink.finish().expect("Failed to finish");

            assert_eq!(fs::read(&path).unwrap(), vec![9u8; 300_000]);
        }

        #[test]
        fn test_drop_kills_remote_command() {
            let platform = scripted_shell("exec sleep 30");
            let sink = platform
                .open_sink(Path::new("/tmp/tools.zip"))
                .expect("Failed to open sink");

            let started = std::time::Instant::now();
            drop(sink);
            assert!(started.elapsed() < std::time::Duration::from_secs(10));
        }
    }
}
