//! Structured error handling and exit codes.

use serde::Serialize;

use crate::session::{ScanReport, ScanStatus};

/// Process exit codes.
///
/// - 0: Success (completed normally, duplicates found)
/// - 1: General error (unexpected failure, or the root could not be scanned)
/// - 2: No duplicates found (completed normally, no duplicates)
/// - 3: Partial success (completed, but some entries could not be read)
/// - 130: Interrupted (scan cancelled, e.g. by Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: Scan completed and duplicates were found.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// No duplicates: Scan completed but no duplicates were found.
    NoDuplicates = 2,
    /// Partial success: Scan completed but some entries were skipped.
    PartialSuccess = 3,
    /// Interrupted: Scan was cancelled.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DS000",
            Self::GeneralError => "DS001",
            Self::NoDuplicates => "DS002",
            Self::PartialSuccess => "DS003",
            Self::Interrupted => "DS130",
        }
    }

    /// Exit code for a finished scan.
    #[must_use]
    pub fn from_report(report: &ScanReport) -> Self {
        match report.status {
            ScanStatus::Aborted => Self::Interrupted,
            ScanStatus::Failed(_) => Self::GeneralError,
            ScanStatus::Completed if report.progress.skipped > 0 => Self::PartialSuccess,
            ScanStatus::Completed if report.summary.duplicate_sets == 0 => Self::NoDuplicates,
            ScanStatus::Completed => Self::Success,
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DS001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
