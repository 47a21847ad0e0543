//! Duplicate finder: the enumerate, index, hash pipeline.
//!
//! # Overview
//!
//! 1. **Enumerate**: walk the root, counting every discovered file
//! 2. **Index**: bucket files by size, largest size first
//! 3. **Group**: hash the members of each multi-member bucket and emit every
//!    hash group with two or more members as a [`DuplicateSet`]
//!
//! Sets are handed to the caller one at a time as soon as their bucket is
//! hashed. Every stage checks the session's cancellation token after each
//! unit of work; cancellation ends the pipeline normally with
//! [`ScanSummary::interrupted`] set, it is not an error.
//!
//! # Example
//!
//! ```no_run
//! use dupsearch::duplicates::DuplicateFinder;
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let (sets, report) = finder.scan(Path::new("/home/user/Downloads")).unwrap();
//! for set in &sets {
//!     println!("{} duplicates {} each", set.len(), set.size_display());
//! }
//! println!("Done in {:.1} sec", report.elapsed_secs());
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;

use super::groups::{index_by_size, DuplicateSet, HashGroup, SizeBucket};
use crate::progress::Phase;
use crate::scanner::{
    FileRecord, Hash, Hasher, ScanError, Walker, WalkerConfig, DEFAULT_BUFFER_SIZE,
};
use crate::session::{ScanReport, ScanSession, ScanStatus};

/// Configuration for the duplicate finder.
#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// Walker configuration for directory traversal.
    pub walker_config: WalkerConfig,
    /// Read buffer size used when hashing.
    pub read_buffer_size: usize,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            walker_config: WalkerConfig::default(),
            read_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl FinderConfig {
    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the hashing read buffer size.
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }
}

/// Duplicate statistics for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Number of duplicate sets emitted
    pub duplicate_sets: usize,
    /// Files in all emitted sets
    pub duplicate_files: usize,
    /// Bytes reclaimable by keeping one copy per set
    pub reclaimable_space: u64,
    /// The scan stopped early on cancellation
    pub interrupted: bool,
}

impl ScanSummary {
    fn interrupted() -> Self {
        Self {
            interrupted: true,
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, set: &DuplicateSet) {
        self.duplicate_sets += 1;
        self.duplicate_files += set.len();
        self.reclaimable_space += set.wasted_space();
    }
}

/// Errors that stop a scan before it can start.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The root directory path was empty.
    #[error("No directory given")]
    EmptyPath,

    /// The root directory is inaccessible.
    #[error(transparent)]
    ScanError(#[from] ScanError),
}

/// Duplicate finder.
#[derive(Debug, Clone, Default)]
pub struct DuplicateFinder {
    config: FinderConfig,
}

impl DuplicateFinder {
    /// Create a finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        Self { config }
    }

    /// Create a finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Finder configuration.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Run the pipeline for `session`, handing each duplicate set to `on_set`.
    ///
    /// `on_set` is called on this thread, once per set, in emission order.
    /// The session is not finished here; that is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError`] only when the root is empty or inaccessible.
    /// Unreadable entries below the root are skipped.
    pub fn find_duplicates<F>(
        &self,
        session: &ScanSession,
        mut on_set: F,
    ) -> Result<ScanSummary, FinderError>
    where
        F: FnMut(DuplicateSet),
    {
        let root = session.root();
        if root.as_os_str().is_empty() {
            return Err(FinderError::EmptyPath);
        }
        let progress = session.progress();

        log::info!("Starting duplicate scan of {}", root.display());
        if session.checkpoint() {
            return Ok(ScanSummary::interrupted());
        }
        progress.set_phase(Phase::Enumerating);

        let walker = Walker::new(root, self.config.walker_config.clone())
            .with_cancel_token(session.cancel_token());
        walker.check_root()?;

        let mut records = Vec::new();
        for result in walker.walk() {
            match result {
                Ok(record) => {
                    progress.record_discovered();
                    records.push(record);
                }
                Err(_) => progress.record_skipped(),
            }
            if session.checkpoint() {
                break;
            }
        }
        if session.checkpoint() {
            log::info!("Enumeration cancelled after {} files", records.len());
            return Ok(ScanSummary::interrupted());
        }
        log::info!("Enumerated {} files", records.len());

        Ok(self.group_records(records, session, &mut on_set))
    }

    /// Run the index and group stages over records enumerated elsewhere.
    ///
    /// Every record counts as discovered. Records whose files cannot be
    /// read are skipped, exactly as during a directory scan.
    pub fn find_duplicates_from_records<F>(
        &self,
        records: Vec<FileRecord>,
        session: &ScanSession,
        mut on_set: F,
    ) -> ScanSummary
    where
        F: FnMut(DuplicateSet),
    {
        for _ in &records {
            session.progress().record_discovered();
        }
        self.group_records(records, session, &mut on_set)
    }

    fn group_records<F>(
        &self,
        records: Vec<FileRecord>,
        session: &ScanSession,
        on_set: &mut F,
    ) -> ScanSummary
    where
        F: FnMut(DuplicateSet),
    {
        let mut summary = ScanSummary::default();

        let Some(buckets) = index_by_size(records, session) else {
            return ScanSummary::interrupted();
        };
        if session.checkpoint() {
            return ScanSummary::interrupted();
        }

        session.progress().set_phase(Phase::Hashing);
        let hasher = Hasher::new().with_buffer_size(self.config.read_buffer_size);
        for bucket in buckets {
            if !self.group_bucket(&hasher, bucket, session, &mut summary, on_set) {
                summary.interrupted = true;
                return summary;
            }
        }

        // Last checkpoint: a cancel that lands after the final bucket still
        // counts as an abort.
        if session.checkpoint() {
            summary.interrupted = true;
            return summary;
        }

        log::info!(
            "Found {} duplicate sets ({} files, {} reclaimable)",
            summary.duplicate_sets,
            summary.duplicate_files,
            ByteSize::b(summary.reclaimable_space)
        );
        summary
    }

    /// Hash one size bucket and emit its duplicate sets.
    ///
    /// Returns `false` when the scan was cancelled.
    fn group_bucket<F>(
        &self,
        hasher: &Hasher,
        bucket: SizeBucket,
        session: &ScanSession,
        summary: &mut ScanSummary,
        on_set: &mut F,
    ) -> bool
    where
        F: FnMut(DuplicateSet),
    {
        let progress = session.progress();

        if !bucket.has_candidates() {
            for record in &bucket.members {
                progress.record_processed(record.size);
            }
            return !session.checkpoint();
        }

        log::trace!(
            "Hashing bucket of {} files, {} bytes each",
            bucket.members.len(),
            bucket.size
        );

        let mut by_hash: BTreeMap<Hash, Vec<PathBuf>> = BTreeMap::new();
        for record in bucket.members {
            match hasher.full_hash(&record.path) {
                Ok(hash) => by_hash.entry(hash).or_default().push(record.path),
                Err(e) => {
                    log::warn!("Skipping unreadable file: {}", e);
                    progress.record_skipped();
                }
            }
            progress.record_processed(record.size);
            if session.checkpoint() {
                return false;
            }
        }

        for (hash, members) in by_hash {
            let group = HashGroup { hash, members };
            if let Some(set) = group.into_duplicate_set(bucket.size) {
                log::debug!(
                    "Duplicate set: {} files of {} ({})",
                    set.len(),
                    set.size_display(),
                    set.hash_hex()
                );
                summary.record(&set);
                on_set(set);
                if session.checkpoint() {
                    return false;
                }
            }
        }
        true
    }

    /// Scan `root` on the calling thread and collect every duplicate set.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError`] when the root is empty or inaccessible.
    pub fn scan(&self, root: &Path) -> Result<(Vec<DuplicateSet>, ScanReport), FinderError> {
        let session = ScanSession::new(root);
        let mut sets = Vec::new();
        match self.find_duplicates(&session, |set| sets.push(set)) {
            Ok(summary) => {
                let status = if summary.interrupted {
                    ScanStatus::Aborted
                } else {
                    ScanStatus::Completed
                };
                session.finish(status);
                Ok((sets, session.report(summary)))
            }
            Err(e) => {
                session.finish(ScanStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }
}
