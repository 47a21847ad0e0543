//! Output front ends for scan results.
//!
//! Both reporters are [`ScanObserver`]s, so they receive duplicate sets as
//! the scan finds them:
//! - [`ConsoleReporter`]: status spinner plus human-readable sets
//! - [`JsonReporter`]: one JSON object per line, for scripting
//!
//! [`Collector`] wraps either one and keeps the delivered sets for a later
//! delete step.
//!
//! # Example
//!
//! ```no_run
//! use dupsearch::controller::ScanController;
//! use dupsearch::output::{Collector, JsonReporter};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let collector = Arc::new(Collector::new(JsonReporter::stdout()));
//! let controller = ScanController::new();
//! controller.start(Path::new("."), collector.clone()).unwrap().wait().unwrap();
//! println!("{} sets kept for review", collector.take_sets().len());
//! ```

pub mod console;
pub mod json;

use std::sync::{Mutex, PoisonError};

pub use console::{finish_message, set_header, short_dir_label, ConsoleReporter};
pub use json::{JsonDuplicateSet, JsonOutputError, JsonReporter, JsonSummary};

use crate::duplicates::DuplicateSet;
use crate::progress::{ScanObserver, StatusUpdate};
use crate::session::ScanReport;

/// Forwards everything to `inner` and keeps a copy of every delivered set.
pub struct Collector<O: ScanObserver> {
    inner: O,
    sets: Mutex<Vec<DuplicateSet>>,
}

impl<O: ScanObserver> Collector<O> {
    /// Wrap an observer.
    #[must_use]
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            sets: Mutex::new(Vec::new()),
        }
    }

    /// Remove and return the sets delivered so far.
    pub fn take_sets(&self) -> Vec<DuplicateSet> {
        std::mem::take(&mut *self.sets.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<O: ScanObserver> ScanObserver for Collector<O> {
    fn on_duplicate_set(&self, set: &DuplicateSet) {
        self.inner.on_duplicate_set(set);
        self.sets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(set.clone());
    }

    fn on_status_update(&self, status: &StatusUpdate) {
        self.inner.on_status_update(status);
    }

    fn on_scan_finished(&self, report: &ScanReport) {
        self.inner.on_scan_finished(report);
    }
}
