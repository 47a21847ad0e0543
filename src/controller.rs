//! Scan orchestration.
//!
//! # Overview
//!
//! [`ScanController`] runs one scan at a time on background threads:
//!
//! - **pipeline**: enumerate, index and group (see [`DuplicateFinder`])
//! - **delivery**: hands duplicate sets to the observer, one at a time
//! - **poller**: emits a status update every poll interval
//!
//! The pipeline and the delivery thread are joined by a rendezvous channel,
//! so at most one set is in flight: the pipeline keeps hashing while the
//! observer handles a set, but blocks before handing over the next one.
//! Teardown order is fixed: the pipeline closes the channel, waits for
//! delivery to drain, marks the session finished, stops the poller, and only
//! then reports `on_scan_finished`.
//!
//! # Example
//!
//! ```no_run
//! use dupsearch::controller::ScanController;
//! use dupsearch::progress::SilentObserver;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let controller = ScanController::new();
//! let handle = controller.start(Path::new("."), Arc::new(SilentObserver)).unwrap();
//! let report = handle.wait().unwrap();
//! println!("{} duplicate sets", report.summary.duplicate_sets);
//! ```

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::duplicates::{DuplicateFinder, DuplicateSet, FinderConfig, ScanSummary};
use crate::progress::{run_poller, ScanObserver, DEFAULT_POLL_INTERVAL};
use crate::session::{ScanReport, ScanSession, ScanStatus};

/// Errors reported by the controller.
#[derive(thiserror::Error, Debug)]
pub enum ControllerError {
    /// No directory was given.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The operation needs an idle controller.
    #[error("A scan is in progress")]
    ScanInProgress,

    /// A scan thread could not be started.
    #[error("Failed to spawn scan thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The pipeline thread panicked.
    #[error("Scan thread panicked")]
    WorkerPanicked,
}

type CurrentSession = Arc<Mutex<Option<Arc<ScanSession>>>>;

/// Cancels whatever scan the controller is running, if any.
///
/// Cheap to clone and safe to call from any thread, including a signal
/// handler thread.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    current: CurrentSession,
}

impl CancelHandle {
    /// Request cancellation of the running scan.
    ///
    /// Returns `true` if a live scan was signalled.
    pub fn cancel(&self) -> bool {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some(session) if !session.is_finished() => {
                session.cancel();
                true
            }
            _ => false,
        }
    }
}

/// Handle to a running scan.
#[derive(Debug)]
pub struct ScanHandle {
    session: Arc<ScanSession>,
    pipeline: JoinHandle<ScanReport>,
}

impl ScanHandle {
    /// Shared session state.
    #[must_use]
    pub fn session(&self) -> &Arc<ScanSession> {
        &self.session
    }

    /// Request cancellation of this scan.
    pub fn cancel(&self) {
        self.session.cancel();
    }

    /// Whether the scan reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.session.is_finished()
    }

    /// Block until the scan and all of its threads are done.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::WorkerPanicked`] if the pipeline panicked.
    pub fn wait(self) -> Result<ScanReport, ControllerError> {
        self.pipeline
            .join()
            .map_err(|_| ControllerError::WorkerPanicked)
    }
}

/// Runs scans and owns the selected target directory.
#[derive(Debug)]
pub struct ScanController {
    finder_config: FinderConfig,
    poll_interval: Duration,
    current: CurrentSession,
    directory: Mutex<Option<PathBuf>>,
}

impl Default for ScanController {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanController {
    /// Controller with default finder configuration and poll interval.
    #[must_use]
    pub fn new() -> Self {
        Self {
            finder_config: FinderConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            current: Arc::new(Mutex::new(None)),
            directory: Mutex::new(None),
        }
    }

    /// Set the finder configuration used by future scans.
    #[must_use]
    pub fn with_finder_config(mut self, config: FinderConfig) -> Self {
        self.finder_config = config;
        self
    }

    /// Set the status poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Store the user-selected target directory.
    ///
    /// `None` leaves the current selection unchanged. Selecting a directory
    /// cancels a running scan.
    pub fn set_directory(&self, directory: Option<PathBuf>) {
        let Some(directory) = directory else {
            return;
        };
        self.cancel();
        log::debug!("Selected directory: {}", directory.display());
        *self.directory.lock().unwrap_or_else(PoisonError::into_inner) = Some(directory);
    }

    /// Currently selected target directory.
    #[must_use]
    pub fn directory(&self) -> Option<PathBuf> {
        self.directory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start a scan of the selected directory.
    ///
    /// # Errors
    ///
    /// [`ControllerError::InvalidInput`] if no directory is selected, plus
    /// everything [`ScanController::start`] returns.
    pub fn start_selected(
        &self,
        observer: Arc<dyn ScanObserver>,
    ) -> Result<ScanHandle, ControllerError> {
        let directory = self
            .directory()
            .ok_or_else(|| ControllerError::InvalidInput("no directory selected".to_string()))?;
        self.start(&directory, observer)
    }

    /// Start scanning `directory` in the background.
    ///
    /// A scan that is still running is cancelled first. Errors about the
    /// directory itself (missing, not a directory, unreadable) do not fail
    /// this call; they end the scan with [`ScanStatus::Failed`].
    ///
    /// # Errors
    ///
    /// [`ControllerError::InvalidInput`] for an empty path,
    /// [`ControllerError::Spawn`] if a thread cannot be started.
    pub fn start(
        &self,
        directory: &Path,
        observer: Arc<dyn ScanObserver>,
    ) -> Result<ScanHandle, ControllerError> {
        if directory.as_os_str().is_empty() {
            return Err(ControllerError::InvalidInput(
                "directory must not be empty".to_string(),
            ));
        }

        let session = Arc::new(ScanSession::new(directory));
        {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = current.take() {
                if !previous.is_finished() {
                    log::info!(
                        "Cancelling previous scan of {}",
                        previous.root().display()
                    );
                    previous.cancel();
                }
            }
            *current = Some(Arc::clone(&session));
        }

        match self.spawn_threads(&session, observer) {
            Ok(pipeline) => Ok(ScanHandle { session, pipeline }),
            Err(e) => {
                session.cancel();
                session.finish(ScanStatus::Failed(e.to_string()));
                Err(ControllerError::Spawn(e))
            }
        }
    }

    fn spawn_threads(
        &self,
        session: &Arc<ScanSession>,
        observer: Arc<dyn ScanObserver>,
    ) -> std::io::Result<JoinHandle<ScanReport>> {
        let poller = {
            let session = Arc::clone(session);
            let observer = Arc::clone(&observer);
            let interval = self.poll_interval;
            thread::Builder::new()
                .name("dupsearch-poller".to_string())
                .spawn(move || run_poller(session, interval, observer))?
        };

        let (tx, rx) = mpsc::sync_channel::<DuplicateSet>(0);
        let delivery = {
            let delivery_session = Arc::clone(session);
            let observer = Arc::clone(&observer);
            let spawned = thread::Builder::new()
                .name("dupsearch-delivery".to_string())
                .spawn(move || deliver(&delivery_session, &rx, observer.as_ref()));
            match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    stop_poller(session, poller);
                    return Err(e);
                }
            }
        };

        let finder = DuplicateFinder::new(self.finder_config.clone());
        let pipeline_session = Arc::clone(session);
        thread::Builder::new()
            .name("dupsearch-pipeline".to_string())
            .spawn(move || {
                let session = pipeline_session;
                let result = finder.find_duplicates(&session, |set| {
                    // Blocks until the delivery thread takes the set
                    if tx.send(set).is_err() {
                        log::debug!("Delivery thread gone, dropping duplicate set");
                    }
                });
                drop(tx);
                let delivered = delivery.join().unwrap_or_else(|_| {
                    log::error!("Delivery thread panicked");
                    ScanSummary::default()
                });

                // Report what the observer received, not what was found
                let (status, summary) = match result {
                    Ok(summary) if summary.interrupted || session.is_aborted() => (
                        ScanStatus::Aborted,
                        ScanSummary {
                            interrupted: true,
                            ..delivered
                        },
                    ),
                    Ok(_) => (ScanStatus::Completed, delivered),
                    Err(e) => (ScanStatus::Failed(e.to_string()), ScanSummary::default()),
                };
                session.finish(status);
                poller.thread().unpark();
                if poller.join().is_err() {
                    log::error!("Poller thread panicked");
                }

                let report = session.report(summary);
                observer.on_scan_finished(&report);
                report
            })
    }

    /// Request cancellation of the running scan; no-op when idle.
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    /// Cancel the running scan and mark it aborted right away.
    ///
    /// Idempotent. The pipeline still stops at its next checkpoint; the
    /// final report it delivers carries the aborted status.
    pub fn finish(&self) {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = current.as_ref() {
            if !session.is_finished() {
                session.cancel();
                session.finish(ScanStatus::Aborted);
            }
        }
    }

    /// Whether a scan is in flight.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|session| !session.is_finished())
    }

    /// Fail unless no scan is running.
    ///
    /// # Errors
    ///
    /// [`ControllerError::ScanInProgress`] while a scan runs.
    pub fn ensure_idle(&self) -> Result<(), ControllerError> {
        if self.is_scanning() {
            Err(ControllerError::ScanInProgress)
        } else {
            Ok(())
        }
    }

    /// Cloneable cancel handle for use from other threads.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            current: Arc::clone(&self.current),
        }
    }
}

/// Deliver sets until the pipeline closes the channel.
///
/// Sets received after cancellation are dropped and not counted.
fn deliver(
    session: &ScanSession,
    rx: &Receiver<DuplicateSet>,
    observer: &dyn ScanObserver,
) -> ScanSummary {
    let mut delivered = ScanSummary::default();
    for set in rx {
        if session.is_cancelled() {
            log::trace!("Dropping duplicate set after cancellation");
            continue;
        }
        observer.on_duplicate_set(&set);
        delivered.record(&set);
    }
    delivered
}

fn stop_poller(session: &ScanSession, poller: JoinHandle<()>) {
    session.finish(ScanStatus::Failed("scan threads could not start".to_string()));
    poller.thread().unpark();
    if poller.join().is_err() {
        log::error!("Poller thread panicked");
    }
}
