//! Per-scan session state.
//!
//! A [`ScanSession`] is created for every scan and shared (via `Arc`)
//! between the pipeline thread, the result delivery thread and the
//! progress poller. It owns:
//!
//! - the [`CancelToken`] checked at every cancellation checkpoint,
//! - the [`ScanProgress`] counters,
//! - the `finished` / `aborted` flags and the final status.
//!
//! Nothing here survives a scan: starting a new scan builds a new session.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::duplicates::ScanSummary;
use crate::progress::{Phase, ProgressSnapshot, ScanProgress, StatusUpdate};

/// Cooperative cancellation flag.
///
/// Cloning shares the underlying flag, so a clone handed to another thread
/// observes (and can trigger) the same cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Terminal status of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    /// Every bucket was processed.
    Completed,
    /// Cancelled before completion.
    Aborted,
    /// The root could not be scanned.
    Failed(String),
}

/// Final report delivered when a scan finishes.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Scanned directory
    pub root: PathBuf,
    /// How the scan ended
    pub status: ScanStatus,
    /// Wall-clock duration from start to finish
    pub elapsed: Duration,
    /// Counters at the moment the scan finished
    pub progress: ProgressSnapshot,
    /// Duplicate statistics
    pub summary: ScanSummary,
}

impl ScanReport {
    /// Whether the scan was cancelled.
    #[must_use]
    pub fn aborted(&self) -> bool {
        self.status == ScanStatus::Aborted
    }

    /// Whether the scan ran to completion.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.status == ScanStatus::Completed
    }

    /// Elapsed time in (fractional) seconds.
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// State of one scan, shared by all of its threads.
#[derive(Debug)]
pub struct ScanSession {
    root: PathBuf,
    cancel: CancelToken,
    progress: ScanProgress,
    started: Instant,
    finished: AtomicBool,
    aborted: AtomicBool,
    outcome: OnceLock<(ScanStatus, Duration)>,
}

impl ScanSession {
    /// Start a new session for `root`. The clock starts now.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            cancel: CancelToken::new(),
            progress: ScanProgress::new(),
            started: Instant::now(),
            finished: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            outcome: OnceLock::new(),
        }
    }

    /// Directory being scanned.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A clone of this session's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Request cancellation; observed at the next checkpoint.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            log::info!("Cancellation requested for {}", self.root.display());
        }
        self.cancel.cancel();
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancellation checkpoint.
    ///
    /// Returns `true` when the caller must stop; the session is then
    /// marked aborted.
    pub fn checkpoint(&self) -> bool {
        if self.cancel.is_cancelled() {
            self.aborted.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    /// Shared progress counters.
    #[must_use]
    pub fn progress(&self) -> &ScanProgress {
        &self.progress
    }

    /// Time since the session started, or the final duration once finished.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.outcome
            .get()
            .map_or_else(|| self.started.elapsed(), |(_, elapsed)| *elapsed)
    }

    /// Status line for the poller.
    #[must_use]
    pub fn status_update(&self, tick: u8) -> StatusUpdate {
        let snapshot = self.progress.snapshot();
        StatusUpdate {
            phase: snapshot.phase,
            elapsed: self.elapsed(),
            percent: snapshot.percent_complete(),
            tick,
        }
    }

    /// Whether the session reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Whether the session was aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Final status, once finished.
    #[must_use]
    pub fn status(&self) -> Option<ScanStatus> {
        self.outcome.get().map(|(status, _)| status.clone())
    }

    /// Move the session to its terminal state.
    ///
    /// Idempotent: only the first call records the status and elapsed
    /// time; later calls return `false`. Every call resets the phase to
    /// idle, since a pipeline that is still winding down may have moved it.
    pub fn finish(&self, status: ScanStatus) -> bool {
        let elapsed = self.started.elapsed();
        if self.outcome.set((status.clone(), elapsed)).is_err() {
            self.progress.set_phase(Phase::Idle);
            return false;
        }
        if status == ScanStatus::Aborted {
            self.aborted.store(true, Ordering::SeqCst);
        }
        self.progress.set_phase(Phase::Idle);
        self.finished.store(true, Ordering::SeqCst);

        match &status {
            ScanStatus::Completed => log::info!(
                "Scanned {} in {:.3} sec",
                self.root.display(),
                elapsed.as_secs_f64()
            ),
            ScanStatus::Aborted => log::info!(
                "Scanning {} aborted, took {:.3} sec",
                self.root.display(),
                elapsed.as_secs_f64()
            ),
            ScanStatus::Failed(reason) => log::error!(
                "Scanning {} failed after {:.3} sec: {}",
                self.root.display(),
                elapsed.as_secs_f64(),
                reason
            ),
        }
        true
    }

    /// Build the final report. Uses the recorded status when finished.
    #[must_use]
    pub fn report(&self, summary: ScanSummary) -> ScanReport {
        let (status, elapsed) = self.outcome.get().cloned().unwrap_or_else(|| {
            let status = if self.is_aborted() {
                ScanStatus::Aborted
            } else {
                ScanStatus::Completed
            };
            (status, self.started.elapsed())
        });
        ScanReport {
            root: self.root.clone(),
            status,
            elapsed,
            progress: self.progress.snapshot(),
            summary,
        }
    }
}
