//! Directory walker implementation using jwalk.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing a directory
//! tree and producing a lazy sequence of [`FileRecord`]s for duplicate
//! detection.
//!
//! # Features
//!
//! - Recursive traversal; symbolic links are never followed and never yielded
//! - Only regular files are yielded (no directories, devices, sockets)
//! - Unreadable entries are yielded as [`ScanError`] values, not fatal
//! - Cooperative cancellation via [`CancelToken`]
//!
//! # Example
//!
//! ```no_run
//! use dupsearch::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), WalkerConfig::default());
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use super::{FileRecord, ScanError, WalkerConfig};
use crate::session::CancelToken;

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional cancellation token checked before every entry
    cancel: Option<CancelToken>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            cancel: None,
        }
    }

    /// Stop yielding entries once `token` is cancelled.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Root directory of this walk.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Verify that the root exists, is a directory, and can be listed.
    ///
    /// This is the only fatal error of a walk: failures below the root
    /// are reported per entry by [`Walker::walk`].
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotFound`], [`ScanError::NotADirectory`],
    /// [`ScanError::PermissionDenied`] or [`ScanError::Io`].
    pub fn check_root(&self) -> Result<(), ScanError> {
        let metadata = fs::metadata(&self.root)
            .map_err(|e| ScanError::from_io(self.root.clone(), e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }
        fs::read_dir(&self.root).map_err(|e| ScanError::from_io(self.root.clone(), e))?;
        Ok(())
    }

    /// Walk the directory tree, yielding regular, non-symlink files.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. Order is traversal order. Iteration ends early when the
    /// cancellation token fires.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileRecord, ScanError>> + '_ {
        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(self.config.skip_hidden)
            .sort(true);

        walk_dir
            .into_iter()
            .take_while(move |_| {
                if self.is_cancelled() {
                    log::debug!("Walker: cancellation requested, stopping iteration");
                    false
                } else {
                    true
                }
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    // jwalk yields the root itself at depth 0
                    if entry.depth == 0 {
                        return None;
                    }

                    let file_type = entry.file_type();
                    if file_type.is_symlink() {
                        log::trace!("Skipping symlink: {}", entry.path().display());
                        return None;
                    }
                    if !file_type.is_file() {
                        return None;
                    }

                    let path = entry.path();
                    match fs::symlink_metadata(&path) {
                        Ok(metadata) if metadata.is_file() => {
                            Some(Ok(FileRecord::new(path, metadata.len())))
                        }
                        Ok(_) => None,
                        Err(e) => Some(Err(self.handle_io_error(path, e))),
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    Some(Err(self.handle_jwalk_error(path, &e)))
                }
            })
    }

    /// Handle I/O errors during file access.
    fn handle_io_error(&self, path: PathBuf, error: std::io::Error) -> ScanError {
        match error.kind() {
            std::io::ErrorKind::NotFound => {
                log::debug!("File vanished during scan: {}", path.display());
            }
            _ => log::warn!("Cannot read {}: {}", path.display(), error),
        }
        ScanError::from_io(path, error)
    }

    /// Handle jwalk errors (typically unreadable subdirectories).
    fn handle_jwalk_error(&self, path: PathBuf, error: &jwalk::Error) -> ScanError {
        log::warn!("Walker error for {}: {}", path.display(), error);
        let kind = error
            .io_error()
            .map_or(std::io::ErrorKind::Other, std::io::Error::kind);
        ScanError::from_io(path, std::io::Error::new(kind, error.to_string()))
    }
}
