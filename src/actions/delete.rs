//! Safe file deletion using the trash crate.
//!
//! # Overview
//!
//! Deletion is the follow-up step after a scan:
//! - [`select_duplicates`] picks every file of each duplicate set except the
//!   first, so one copy always survives
//! - a [`DeleteConfirmation`] asks the user before anything is touched
//! - files move to the system trash by default, or are removed permanently
//! - per-file failures are collected, never fatal
//!
//! Deleting is refused while a scan is in flight.
//!
//! # Example
//!
//! ```no_run
//! use dupsearch::actions::delete::{delete_selected, select_for_deletion, DeleteConfig, StdinConfirmation};
//! use dupsearch::controller::ScanController;
//! use dupsearch::duplicates::DuplicateFinder;
//! use std::path::Path;
//!
//! let (sets, _) = DuplicateFinder::with_defaults().scan(Path::new(".")).unwrap();
//! let selected = select_for_deletion(&sets).unwrap();
//! let controller = ScanController::new();
//! let confirm = StdinConfirmation::new(false);
//! if let Some(result) = delete_selected(&controller, &selected, &confirm, &DeleteConfig::trash()).unwrap() {
//!     println!("{}", result.summary());
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use thiserror::Error;

use crate::controller::ScanController;
use crate::duplicates::DuplicateSet;

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// File that could not be trashed
        path: PathBuf,
        /// Error reported by the trash backend
        message: String,
    },

    /// Permanent delete operation failed.
    #[error("permanent delete failed for {path}: {message}")]
    PermanentDeleteFailed {
        /// File that could not be removed
        path: PathBuf,
        /// Error reported by the OS
        message: String,
    },

    /// Attempted to delete all copies (at least one must be preserved).
    #[error("cannot delete all copies - at least one file must be preserved")]
    AllCopiesWouldBeDeleted,

    /// A scan is running; results may still change.
    #[error("cannot delete while a scan is in progress")]
    ScanInProgress,

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// File being inspected
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::TrashFailed { path: p, .. }
            | Self::PermanentDeleteFailed { path: p, .. }
            | Self::Io { path: p, .. } => Some(p),
            Self::AllCopiesWouldBeDeleted | Self::ScanInProgress => None,
        }
    }

    fn from_metadata(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Result of a successful deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    /// Path that was deleted.
    pub path: PathBuf,
    /// Size of the deleted file in bytes.
    pub size: u64,
    /// Whether deletion was permanent (true) or to trash (false).
    pub permanent: bool,
}

/// Results of a batch deletion.
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteResult {
    /// Successfully deleted files.
    pub successes: Vec<DeleteResult>,
    /// Failed deletions with their errors.
    pub failures: Vec<(PathBuf, String)>,
    /// Total bytes freed.
    pub bytes_freed: u64,
}

impl BatchDeleteResult {
    /// Number of successful deletions.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Number of failed deletions.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Number of files attempted.
    #[must_use]
    pub fn total_attempted(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Check if all deletions succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!(
                "Deleted {} file(s), freed {}",
                self.success_count(),
                ByteSize::b(self.bytes_freed)
            )
        } else {
            format!(
                "Deleted {} file(s), {} failed, freed {}",
                self.success_count(),
                self.failure_count(),
                ByteSize::b(self.bytes_freed)
            )
        }
    }
}

/// Configuration for deletion operations.
#[derive(Debug, Clone)]
pub struct DeleteConfig {
    /// Use permanent deletion instead of trash.
    pub permanent: bool,
    /// Process remaining files after a failure.
    pub continue_on_error: bool,
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            permanent: false,
            continue_on_error: true,
        }
    }
}

impl DeleteConfig {
    /// Move files to the trash.
    #[must_use]
    pub fn trash() -> Self {
        Self::default()
    }

    /// Remove files permanently.
    #[must_use]
    pub fn permanent() -> Self {
        Self {
            permanent: true,
            ..Self::default()
        }
    }

    /// Enable/disable continue on error.
    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }
}

/// Asks the user whether the selected files may be deleted.
pub trait DeleteConfirmation {
    /// `true` to go ahead with deleting `paths`.
    fn confirm(&self, paths: &[PathBuf]) -> bool;
}

impl<F: Fn(&[PathBuf]) -> bool> DeleteConfirmation for F {
    fn confirm(&self, paths: &[PathBuf]) -> bool {
        self(paths)
    }
}

/// Interactive `[y/N]` prompt on stderr, answer read from stdin.
#[derive(Debug, Clone, Copy)]
pub struct StdinConfirmation {
    assume_yes: bool,
}

impl StdinConfirmation {
    /// `assume_yes` skips the prompt and always confirms.
    #[must_use]
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    /// Prompt text for `count` files.
    #[must_use]
    pub fn prompt(count: usize) -> String {
        format!("Delete {} selected files? [y/N] ", count)
    }

    /// Ask on `output`, read the answer from `input`.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from either stream.
    pub fn ask<R: BufRead, W: Write>(count: usize, input: &mut R, output: &mut W) -> io::Result<bool> {
        output.write_all(Self::prompt(count).as_bytes())?;
        output.flush()?;
        let mut answer = String::new();
        input.read_line(&mut answer)?;
        Ok(is_yes(&answer))
    }
}

impl DeleteConfirmation for StdinConfirmation {
    fn confirm(&self, paths: &[PathBuf]) -> bool {
        if self.assume_yes {
            return true;
        }
        match Self::ask(paths.len(), &mut io::stdin().lock(), &mut io::stderr()) {
            Ok(answer) => answer,
            Err(e) => {
                log::warn!("Could not read confirmation: {}", e);
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Every path of each set except the first.
#[must_use]
pub fn select_duplicates(sets: &[DuplicateSet]) -> Vec<PathBuf> {
    sets.iter()
        .flat_map(|set| set.paths.iter().skip(1).cloned())
        .collect()
}

/// Paths to delete from `sets`, checked so that every set keeps a copy.
///
/// # Errors
///
/// Returns [`DeleteError::AllCopiesWouldBeDeleted`] if the selection would
/// remove every path of some set (a set listing the same path twice).
pub fn select_for_deletion(sets: &[DuplicateSet]) -> Result<Vec<PathBuf>, DeleteError> {
    let selected = select_duplicates(sets);
    for set in sets {
        validate_preserves_copy(&selected, &set.paths)?;
    }
    Ok(selected)
}

/// Move a single file to the system trash.
///
/// # Errors
///
/// `NotFound`, `PermissionDenied` or `Io` if the file cannot be inspected,
/// `TrashFailed` if the trash backend fails.
pub fn delete_to_trash(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = fs::metadata(path)
        .map_err(|e| DeleteError::from_metadata(path, e))?
        .len();

    trash::delete(path).map_err(|e| {
        log::error!("Trash operation failed for {}: {}", path.display(), e);
        DeleteError::TrashFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Moved to trash: {} ({} bytes)", path.display(), size);
    Ok(DeleteResult {
        path: path.to_path_buf(),
        size,
        permanent: false,
    })
}

/// Permanently delete a single file.
///
/// # Errors
///
/// `NotFound`, `PermissionDenied` or `Io` if the file cannot be inspected,
/// `PermanentDeleteFailed` if removal fails.
pub fn permanent_delete(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = fs::metadata(path)
        .map_err(|e| DeleteError::from_metadata(path, e))?
        .len();

    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        DeleteError::PermanentDeleteFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);
    Ok(DeleteResult {
        path: path.to_path_buf(),
        size,
        permanent: true,
    })
}

/// Delete one file according to `config`.
///
/// # Errors
///
/// See [`delete_to_trash`] and [`permanent_delete`].
pub fn delete_file(path: &Path, config: &DeleteConfig) -> Result<DeleteResult, DeleteError> {
    if config.permanent {
        permanent_delete(path)
    } else {
        delete_to_trash(path)
    }
}

/// Delete `paths`, collecting per-file failures.
#[must_use]
pub fn delete_batch(paths: &[PathBuf], config: &DeleteConfig) -> BatchDeleteResult {
    let mut result = BatchDeleteResult::default();

    for path in paths {
        match delete_file(path, config) {
            Ok(deleted) => {
                result.bytes_freed += deleted.size;
                result.successes.push(deleted);
            }
            Err(e) => {
                let message = e.to_string();
                log::warn!("Failed to delete {}: {}", path.display(), message);
                result.failures.push((path.clone(), message));
                if !config.continue_on_error {
                    log::info!("Stopping batch deletion after error");
                    break;
                }
            }
        }
    }

    log::info!("{}", result.summary());
    result
}

/// Check that a selection keeps at least one file of `group_paths`.
///
/// # Errors
///
/// Returns `AllCopiesWouldBeDeleted` if every copy is selected.
///
/// # Example
///
/// ```
/// use dupsearch::actions::delete::validate_preserves_copy;
/// use std::path::PathBuf;
///
/// let group = vec![PathBuf::from("/original.txt"), PathBuf::from("/copy.txt")];
/// assert!(validate_preserves_copy(&group[1..], &group).is_ok());
/// assert!(validate_preserves_copy(&group, &group).is_err());
/// ```
pub fn validate_preserves_copy(
    selected_paths: &[PathBuf],
    group_paths: &[PathBuf],
) -> Result<(), DeleteError> {
    let selected: HashSet<&PathBuf> = selected_paths.iter().collect();
    if group_paths.iter().all(|p| selected.contains(p)) {
        return Err(DeleteError::AllCopiesWouldBeDeleted);
    }
    Ok(())
}

/// Confirm and delete `paths`, only while no scan is running.
///
/// Returns `Ok(None)` when there is nothing to delete or the user declined.
///
/// # Errors
///
/// Returns [`DeleteError::ScanInProgress`] if `controller` is scanning.
pub fn delete_selected<C: DeleteConfirmation + ?Sized>(
    controller: &ScanController,
    paths: &[PathBuf],
    confirmation: &C,
    config: &DeleteConfig,
) -> Result<Option<BatchDeleteResult>, DeleteError> {
    if controller.ensure_idle().is_err() {
        return Err(DeleteError::ScanInProgress);
    }
    if paths.is_empty() {
        return Ok(None);
    }
    if !confirmation.confirm(paths) {
        log::info!("Deletion of {} files declined", paths.len());
        return Ok(None);
    }
    Ok(Some(delete_batch(paths, config)))
}
