//! JSON lines output for duplicate scan results.
//!
//! Every duplicate set is written as one JSON object per line as soon as it
//! is found; a final `summary` object closes the stream.
//!
//! # Output Schema
//!
//! ```json
//! {"hash":"af13...","size":1024,"size_display":"1.0 KiB","files":["/a","/b"]}
//! {"summary":{"root":"/data","status":"completed","elapsed_ms":12,"total_files":3,...}}
//! ```

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::duplicates::DuplicateSet;
use crate::progress::ScanObserver;
use crate::session::{ScanReport, ScanStatus};

/// A single duplicate set in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateSet {
    /// BLAKE3 hash as hexadecimal string (64 characters)
    pub hash: String,
    /// Size of each file in bytes
    pub size: u64,
    /// Human-readable size
    pub size_display: String,
    /// Paths of all files in the set
    pub files: Vec<String>,
}

impl JsonDuplicateSet {
    /// Convert a duplicate set.
    #[must_use]
    pub fn from_duplicate_set(set: &DuplicateSet) -> Self {
        Self {
            hash: set.hash_hex(),
            size: set.size,
            size_display: set.size_display(),
            files: set
                .paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Scan summary in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Scanned directory
    pub root: String,
    /// `completed`, `aborted` or `failed`
    pub status: &'static str,
    /// Failure reason, for failed scans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration in milliseconds
    pub elapsed_ms: u64,
    /// Files discovered
    pub total_files: u64,
    /// Bytes across discovered files
    pub total_bytes: u64,
    /// Entries that could not be read
    pub skipped: u64,
    /// Number of duplicate sets
    pub duplicate_sets: usize,
    /// Files in all duplicate sets
    pub duplicate_files: usize,
    /// Bytes reclaimable by keeping one copy per set
    pub reclaimable_space: u64,
    /// Whether the scan was interrupted
    pub interrupted: bool,
}

impl JsonSummary {
    /// Convert a final report.
    #[must_use]
    pub fn from_report(report: &ScanReport) -> Self {
        let (status, error) = match &report.status {
            ScanStatus::Completed => ("completed", None),
            ScanStatus::Aborted => ("aborted", None),
            ScanStatus::Failed(reason) => ("failed", Some(reason.clone())),
        };
        Self {
            root: report.root.to_string_lossy().into_owned(),
            status,
            error,
            elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            total_files: report.progress.total_files,
            total_bytes: report.progress.total_bytes,
            skipped: report.progress.skipped,
            duplicate_sets: report.summary.duplicate_sets,
            duplicate_files: report.summary.duplicate_files,
            reclaimable_space: report.summary.reclaimable_space,
            interrupted: report.summary.interrupted,
        }
    }
}

#[derive(Serialize)]
struct SummaryLine<'a> {
    summary: &'a JsonSummary,
}

/// Errors that can occur while writing JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization failed.
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing to the output failed.
    #[error("I/O error during JSON output: {0}")]
    Io(#[from] std::io::Error),
}

/// Observer writing JSON lines to `W`.
#[derive(Debug)]
pub struct JsonReporter<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonReporter<std::io::Stdout> {
    /// Reporter writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonReporter<W> {
    /// Reporter writing to `writer`.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_line<T: Serialize>(&self, value: &T) -> Result<(), JsonOutputError> {
        let line = serde_json::to_string(value)?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> ScanObserver for JsonReporter<W> {
    fn on_duplicate_set(&self, set: &DuplicateSet) {
        if let Err(e) = self.write_line(&JsonDuplicateSet::from_duplicate_set(set)) {
            log::error!("Failed to write duplicate set: {}", e);
        }
    }

    fn on_scan_finished(&self, report: &ScanReport) {
        let summary = JsonSummary::from_report(report);
        if let Err(e) = self.write_line(&SummaryLine { summary: &summary }) {
            log::error!("Failed to write scan summary: {}", e);
        }
    }
}
