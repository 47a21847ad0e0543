//! Size bucketing and duplicate set types.
//!
//! # Overview
//!
//! Size bucketing is the first phase of duplicate detection. Files with
//! different sizes cannot be duplicates, so only buckets with two or more
//! members are ever hashed. Buckets come out largest size first, which
//! surfaces the most valuable duplicates early.
//!
//! # Example
//!
//! ```
//! use dupsearch::duplicates::SizeIndex;
//! use dupsearch::scanner::FileRecord;
//! use std::path::PathBuf;
//!
//! let mut index = SizeIndex::new();
//! index.insert(FileRecord::new(PathBuf::from("/a"), 1024));
//! index.insert(FileRecord::new(PathBuf::from("/b"), 1024));
//! index.insert(FileRecord::new(PathBuf::from("/c"), 4096));
//!
//! let buckets = index.into_buckets();
//! assert_eq!(buckets[0].size, 4096);
//! assert_eq!(buckets[1].members.len(), 2);
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use bytesize::ByteSize;

use crate::scanner::{hash_to_hex, FileRecord, Hash};
use crate::session::ScanSession;

/// Files sharing one exact size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeBucket {
    /// Size shared by every member
    pub size: u64,
    /// Members in enumeration order
    pub members: Vec<FileRecord>,
}

impl SizeBucket {
    /// Whether the bucket can hold duplicates at all.
    #[must_use]
    pub fn has_candidates(&self) -> bool {
        self.members.len() > 1
    }
}

/// Size index built during enumeration.
#[derive(Debug, Default)]
pub struct SizeIndex {
    groups: BTreeMap<u64, Vec<FileRecord>>,
    total_files: u64,
    total_bytes: u64,
}

impl SizeIndex {
    /// Empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record to the bucket for its size.
    pub fn insert(&mut self, record: FileRecord) {
        self.total_files += 1;
        self.total_bytes += record.size;
        self.groups.entry(record.size).or_default().push(record);
    }

    /// Number of indexed files.
    #[must_use]
    pub fn total_files(&self) -> u64 {
        self.total_files
    }

    /// Sum of all indexed sizes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Number of distinct sizes.
    #[must_use]
    pub fn unique_sizes(&self) -> usize {
        self.groups.len()
    }

    /// Consume the index into buckets ordered by size, largest first.
    #[must_use]
    pub fn into_buckets(self) -> Vec<SizeBucket> {
        self.groups
            .into_iter()
            .rev()
            .map(|(size, members)| SizeBucket { size, members })
            .collect()
    }
}

/// Index `records` by size, accumulating the session's byte total.
///
/// Checks for cancellation between insertions. Returns `None` when the scan
/// was cancelled; the partial index is discarded.
pub fn index_by_size(records: Vec<FileRecord>, session: &ScanSession) -> Option<Vec<SizeBucket>> {
    let mut index = SizeIndex::new();
    for record in records {
        if session.checkpoint() {
            log::debug!("Size indexing cancelled after {} files", index.total_files());
            return None;
        }
        session.progress().add_total_bytes(record.size);
        index.insert(record);
    }

    log::info!(
        "Indexed {} files ({}) into {} size buckets",
        index.total_files(),
        ByteSize::b(index.total_bytes()),
        index.unique_sizes()
    );
    Some(index.into_buckets())
}

/// Members of one size bucket sharing a content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashGroup {
    /// Content hash
    pub hash: Hash,
    /// Files with that hash
    pub members: Vec<PathBuf>,
}

impl HashGroup {
    /// Promote to a duplicate set if there are at least two members.
    #[must_use]
    pub fn into_duplicate_set(self, size: u64) -> Option<DuplicateSet> {
        if self.members.len() < 2 {
            return None;
        }
        Some(DuplicateSet {
            hash: self.hash,
            size,
            paths: self.members,
        })
    }
}

/// Files with identical size and content hash; always two or more paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSet {
    /// Shared content hash
    pub hash: Hash,
    /// Size of each file
    pub size: u64,
    /// Member paths
    pub paths: Vec<PathBuf>,
}

impl DuplicateSet {
    /// Number of files in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the set has no paths (never true for emitted sets).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Space reclaimable by keeping one copy.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * (self.paths.len().saturating_sub(1)) as u64
    }

    /// Hash as lowercase hex.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.hash)
    }

    /// Human-readable size of one member.
    #[must_use]
    pub fn size_display(&self) -> String {
        ByteSize::b(self.size).to_string()
    }
}
