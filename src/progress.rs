//! Progress accounting and status polling.
//!
//! The pipeline thread is the only writer of the [`ScanProgress`]
//! counters; the poller only reads them. Counters are plain atomics with
//! relaxed ordering: a snapshot may be slightly stale, which is fine for a
//! progress indicator.
//!
//! While hashing, completion is a weighted blend of byte progress and file
//! progress (1:2), since per-file overhead dominates wall-clock time on
//! trees with many small files:
//!
//! ```text
//! percent = min(100, processed_bytes / total_bytes * 33
//!                  + processed_files / total_files * 67)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::duplicates::DuplicateSet;
use crate::session::{ScanReport, ScanSession};

/// Default interval between status updates.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Number of ticks in one cycle of the dot animation.
const TICK_CYCLE: u8 = 15;

/// Receives everything a scan reports to the outside world.
///
/// All methods have no-op defaults. `on_duplicate_set` is called from the
/// delivery thread, `on_status_update` from the poller thread and
/// `on_scan_finished` from the pipeline thread once everything else stopped.
pub trait ScanObserver: Send + Sync {
    /// A duplicate set was found. The next set is not delivered until
    /// this call returns.
    fn on_duplicate_set(&self, _set: &DuplicateSet) {}

    /// Periodic status while the scan runs.
    fn on_status_update(&self, _status: &StatusUpdate) {}

    /// The scan reached a terminal state.
    fn on_scan_finished(&self, _report: &ScanReport) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl ScanObserver for SilentObserver {}

/// Pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Phase {
    /// No scan running.
    #[default]
    Idle = 0,
    /// Walking the tree and indexing sizes.
    Enumerating = 1,
    /// Hashing size buckets.
    Hashing = 2,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Enumerating,
            2 => Self::Hashing,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Enumerating => write!(f, "enumerating"),
            Self::Hashing => write!(f, "hashing"),
        }
    }
}

/// Shared scan counters.
#[derive(Debug, Default)]
pub struct ScanProgress {
    phase: AtomicU8,
    total_files: AtomicU64,
    processed_files: AtomicU64,
    total_bytes: AtomicU64,
    processed_bytes: AtomicU64,
    skipped: AtomicU64,
}

impl ScanProgress {
    /// All counters zero, phase idle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    /// Enter a new phase.
    pub fn set_phase(&self, phase: Phase) {
        log::debug!("Phase: {}", phase);
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    /// One more file discovered by the enumerator.
    pub fn record_discovered(&self) {
        self.total_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Add an indexed file's size to the byte total.
    pub fn add_total_bytes(&self, bytes: u64) {
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// One file fully processed (hashed, or short-circuited as unique).
    pub fn record_processed(&self, bytes: u64) {
        self.processed_files.fetch_add(1, Ordering::Relaxed);
        self.processed_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// An entry could not be read and was left out.
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: self.phase(),
            total_files: self.total_files.load(Ordering::Relaxed),
            processed_files: self.processed_files.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            processed_bytes: self.processed_bytes.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ScanProgress`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Phase at snapshot time
    pub phase: Phase,
    /// Files discovered
    pub total_files: u64,
    /// Files processed by the grouper
    pub processed_files: u64,
    /// Bytes across all discovered files
    pub total_bytes: u64,
    /// Bytes across processed files
    pub processed_bytes: u64,
    /// Entries skipped because they could not be read
    pub skipped: u64,
}

impl ProgressSnapshot {
    /// Completion percentage; only known while hashing.
    #[must_use]
    pub fn percent_complete(&self) -> Option<f64> {
        match self.phase {
            Phase::Hashing => Some(weighted_percent(
                self.processed_bytes,
                self.total_bytes,
                self.processed_files,
                self.total_files,
            )),
            Phase::Idle | Phase::Enumerating => None,
        }
    }
}

/// Weighted completion percentage, clamped to 100.
///
/// A zero total counts its share as complete, so an empty tree reports 100.
#[must_use]
pub fn weighted_percent(
    processed_bytes: u64,
    total_bytes: u64,
    processed_files: u64,
    total_files: u64,
) -> f64 {
    fn ratio(done: u64, total: u64) -> f64 {
        if total == 0 {
            1.0
        } else {
            done as f64 / total as f64
        }
    }
    (ratio(processed_bytes, total_bytes) * 33.0 + ratio(processed_files, total_files) * 67.0)
        .min(100.0)
}

/// Status line emitted by the poller.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// Current phase
    pub phase: Phase,
    /// Time since the scan started
    pub elapsed: Duration,
    /// Completion percentage (hashing only)
    pub percent: Option<f64>,
    /// Animation tick, cycling 1..=15
    pub tick: u8,
}

impl StatusUpdate {
    /// Number of animation dots for this tick (0..=3).
    #[must_use]
    pub fn dots(&self) -> usize {
        usize::from(self.tick / 5)
    }
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dots = ".".repeat(self.dots());
        match self.phase {
            Phase::Idle => write!(f, "Finished"),
            Phase::Enumerating => write!(
                f,
                "Indexing files {} sec{}",
                self.elapsed.as_secs(),
                dots
            ),
            Phase::Hashing => write!(f, "{:.1}%{}", self.percent.unwrap_or(0.0), dots),
        }
    }
}

/// Advance the animation tick: 1, 2, ..., 15, 1, ...
#[must_use]
pub fn next_tick(tick: u8) -> u8 {
    (tick % TICK_CYCLE) + 1
}

/// Report status every `interval` until the session finishes.
///
/// Runs on its own thread. Never touches the counters, so it cannot block
/// the pipeline. The pipeline unparks this thread on finish to skip the
/// remaining wait.
pub fn run_poller(session: Arc<ScanSession>, interval: Duration, observer: Arc<dyn ScanObserver>) {
    let mut tick = 1;
    while !session.is_finished() {
        observer.on_status_update(&session.status_update(tick));
        tick = next_tick(tick);
        thread::park_timeout(interval);
    }
    log::trace!("Poller stopped for {}", session.root().display());
}
