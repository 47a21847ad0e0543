//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size-based file bucketing
//! - Per-bucket content hashing and grouping
//! - Duplicate set types and statistics

pub mod finder;
pub mod groups;

pub use finder::{DuplicateFinder, FinderConfig, FinderError, ScanSummary};
pub use groups::{index_by_size, DuplicateSet, HashGroup, SizeBucket, SizeIndex};
