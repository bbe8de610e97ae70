//! Preflight validation of the local archive.
//!
//! Runs before any sink is opened so a bad input fails fast and never leaves
//! a partial artifact on the destination.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use tracing::{debug, info};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::TransferError;
use crate::model::{ArchiveSummary, SAMPLE_ENTRY_LIMIT};

/// Check that `path` is a readable zip archive and summarize it.
///
/// The file is opened read-only and the handle is released before this
/// returns, on success and on every error path.
///
/// # Errors
/// `MalformedArchive` when the bytes are not a zip container,
/// `ValidationFailure` for anything else (missing file, I/O error,
/// unsupported archive features).
pub fn validate<P: AsRef<Path>>(path: P) -> Result<ArchiveSummary, TransferError> {
    let path = path.as_ref();
    info!(path = %path.display(), "validating zip file");

    let file = File::open(path).map_err(|e| validation_failure(path, e))?;
    let metadata = file.metadata().map_err(|e| validation_failure(path, e))?;
    if !metadata.is_file() {
        return Err(validation_failure(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }
    let total_bytes = metadata.len();

    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| classify_zip_error(path, e))?;

    let entry_count = archive.len();
    let mut sample_entries = Vec::with_capacity(entry_count.min(SAMPLE_ENTRY_LIMIT));
    for index in 0..entry_count.min(SAMPLE_ENTRY_LIMIT) {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| classify_zip_error(path, e))?;
        sample_entries.push(entry.name().to_string());
    }

    debug!(entry_count, total_bytes, "zip file is valid");

    Ok(ArchiveSummary {
        entry_count,
        total_bytes,
        sample_entries,
    })
}

fn validation_failure(path: &Path, err: io::Error) -> TransferError {
    TransferError::ValidationFailure {
        path: path.to_path_buf(),
        source: ZipError::Io(err),
    }
}

fn classify_zip_error(path: &Path, err: ZipError) -> TransferError {
    match err {
        ZipError::InvalidArchive(reason) => TransferError::MalformedArchive {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        },
        other => TransferError::ValidationFailure {
            path: path.to_path_buf(),
            source: other,
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;
    use std::fs;
    use std::io::Write;

    /// Write a zip archive with the given entries and return its path.
    pub(crate) fn write_zip(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> std::path::PathBuf {
        let path = dir.join(name);
        let file = fs::File::create(&path).expect("Failed to create archive");
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        for (entry_name, contents) in entries {
            zip.start_file(*entry_name, options).expect("Failed to start entry");
            zip.write_all(contents).expect("Failed to write entry");
        }
        zip.finish().expect("Failed to finish archive");
        path
    }

    #[test]
    fn test_validate_counts_entries_and_size() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_zip(
            temp_dir.path(),
            "tools.zip",
            &[("linpeas.sh", b"#!/bin/sh\n"), ("bin/socat", b"\x7fELF"), ("README", b"tools")],
        );

        let summary = validate(&path).expect("Failed to validate");

        assert_eq!(summary.entry_count, 3);
        assert_eq!(summary.total_bytes, fs::metadata(&path).unwrap().len());
        assert_eq!(summary.sample_entries, vec!["linpeas.sh", "bin/socat", "README"]);
        assert!(!summary.has_more_entries());
    }

    #[test]
    fn test_validate_samples_first_entries_in_order() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let names = ["a", "b", "c", "d", "e", "f", "g"];
        let entries: Vec<(&str, &[u8])> = names.iter().map(|n| (*n, b"x".as_slice())).collect();
        let path = write_zip(temp_dir.path(), "many.zip", &entries);

        let summary = validate(&path).expect("Failed to validate");

        assert_eq!(summary.entry_count, 7);
        assert_eq!(summary.sample_entries, vec!["a", "b", "c", "d", "e"]);
        assert!(summary.has_more_entries());
    }

    #[test]
    fn test_validate_empty_archive() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_zip(temp_dir.path(), "empty.zip", &[]);

        let summary = validate(&path).expect("Failed to validate");
        assert_eq!(summary.entry_count, 0);
        assert!(summary.sample_entries.is_empty());
        assert_eq!(summary.total_bytes, 22);
    }

    #[test]
    fn test_validate_rejects_plain_text() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("tools.zip");
        fs::write(&path, b"not a zip").expect("Failed to write file");

        let err = validate(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedArchive);
        assert!(err.to_string().contains("not a valid zip file"));
    }

    #[test]
    fn test_validate_rejects_empty_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("empty");
        fs::File::create(&path).expect("Failed to create file");

        let err = validate(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedArchive);
    }

    #[test]
    fn test_validate_missing_file_is_validation_failure() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = validate(temp_dir.path().join("nonexistent.zip")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    }

    #[test]
    fn test_validate_directory_is_validation_failure() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = validate(temp_dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    }

    #[test]
    fn test_validate_leaves_file_untouched() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_zip(temp_dir.path(), "tools.zip", &[("a", b"abc")]);
        let before = fs::read(&path).unwrap();

        validate(&path).expect("Failed to validate");

        assert_eq!(fs::read(&path).unwrap(), before);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Content without any 'P' byte can never hold a zip signature.
        #[test]
        fn test_non_zip_content_is_malformed(
            content in proptest::collection::vec(any::<u8>().prop_filter("no signature byte", |b| *b != b'P'), 0..4096)
        ) {
            let temp_dir = tempfile::tempdir().unwrap();
            let path = temp_dir.path().join("junk.zip");
            fs::write(&path, &content).unwrap();

            let malformed = matches!(validate(&path), Err(TransferError::MalformedArchive { .. }));
            prop_assert!(malformed, "content without a signature byte was accepted");
        }

        #[test]
        fn test_entry_count_matches(count in 0usize..20) {
            let temp_dir = tempfile::tempdir().unwrap();
            let names: Vec<String> = (0..count).map(|i| format!("file{i}.bin")).collect();
            let entries: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), b"payload".as_slice())).collect();
            let path = write_zip(temp_dir.path(), "gen.zip", &entries);

            let summary = validate(&path).unwrap();
            prop_assert_eq!(summary.entry_count, count);
            prop_assert_eq!(summary.total_bytes, fs::metadata(&path).unwrap().len());
        }
    }
}
