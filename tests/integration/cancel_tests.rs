//! Cancellation: stopping a scan at any checkpoint.

use dupsearch::controller::ScanController;
use dupsearch::duplicates::{DuplicateFinder, DuplicateSet};
use dupsearch::progress::{Phase, ScanObserver, SilentObserver};
use dupsearch::session::{ScanReport, ScanSession, ScanStatus};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tempfile::TempDir;

fn pairs_tree(n: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    for i in 0..n {
        let content = vec![b'0' + (i % 10) as u8; (i + 1) * 3];
        fs::write(dir.path().join(format!("f{i}_a")), &content).unwrap();
        fs::write(dir.path().join(format!("f{i}_b")), &content).unwrap();
    }
    dir
}

/// Cancels the scan from inside the first `on_duplicate_set`.
#[derive(Default)]
struct CancelOnFirstSet {
    session: OnceLock<Arc<ScanSession>>,
    sets: AtomicUsize,
    finished: AtomicUsize,
}

impl ScanObserver for CancelOnFirstSet {
    fn on_duplicate_set(&self, _set: &DuplicateSet) {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if let Some(session) = self.session.get() {
            session.cancel();
        }
    }

    fn on_scan_finished(&self, _report: &ScanReport) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Signals entry into `on_duplicate_set`, then waits to be released.
struct Gate {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl ScanObserver for Gate {
    fn on_duplicate_set(&self, _set: &DuplicateSet) {
        let _ = self.entered.lock().unwrap().send(());
        let _ = self.release.lock().unwrap().recv();
    }
}

#[test]
fn test_cancel_inside_first_set_delivers_only_that_set() {
    let dir = pairs_tree(4);
    let observer = Arc::new(CancelOnFirstSet::default());
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();

    // Hold the first set until the observer knows its session
    let gate = Arc::new(Gate {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    struct Both(Arc<Gate>, Arc<CancelOnFirstSet>);
    impl ScanObserver for Both {
        fn on_duplicate_set(&self, set: &DuplicateSet) {
            self.0.on_duplicate_set(set);
            self.1.on_duplicate_set(set);
        }
        fn on_scan_finished(&self, report: &ScanReport) {
            self.1.on_scan_finished(report);
        }
    }

    let controller = ScanController::new();
    let handle = controller
        .start(dir.path(), Arc::new(Both(gate, observer.clone())))
        .unwrap();
    let _ = observer.session.set(Arc::clone(handle.session()));
    entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    release_tx.send(()).unwrap();

    let session = Arc::clone(handle.session());
    let report = handle.wait().unwrap();

    assert_eq!(observer.sets.load(Ordering::SeqCst), 1);
    assert_eq!(observer.finished.load(Ordering::SeqCst), 1);
    assert_eq!(report.status, ScanStatus::Aborted);
    assert!(report.summary.interrupted);
    // Sets dropped after the cancel are not counted
    assert_eq!(report.summary.duplicate_sets, 1);
    assert_eq!(report.summary.duplicate_files, 2);
    assert!(session.is_aborted());
    assert!(session.is_finished());
}

#[test]
fn test_cancel_before_start_yields_no_sets() {
    let dir = pairs_tree(3);
    let session = ScanSession::new(dir.path());
    session.cancel();

    let mut sets = Vec::new();
    let summary = DuplicateFinder::with_defaults()
        .find_duplicates(&session, |set| sets.push(set))
        .unwrap();

    assert!(sets.is_empty());
    assert!(summary.interrupted);
    assert!(session.is_aborted());
}

#[test]
fn test_cancel_handle_stops_running_scan() {
    let dir = pairs_tree(3);
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let gate = Arc::new(Gate {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });

    let controller = ScanController::new();
    let cancel = controller.cancel_handle();
    let handle = controller.start(dir.path(), gate).unwrap();
    entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();

    assert!(cancel.cancel());
    release_tx.send(()).unwrap();
    let report = handle.wait().unwrap();

    assert!(report.aborted());
    assert!(!controller.is_scanning());
    assert!(!cancel.cancel());
}

#[test]
fn test_finish_is_idempotent_and_aborts() {
    let dir = pairs_tree(2);
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let gate = Arc::new(Gate {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });

    let controller = ScanController::new();
    let handle = controller.start(dir.path(), gate).unwrap();
    entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();

    controller.finish();
    let elapsed = handle.session().elapsed();
    controller.finish();

    assert!(handle.is_finished());
    assert!(!controller.is_scanning());
    assert_eq!(handle.session().status(), Some(ScanStatus::Aborted));
    assert_eq!(handle.session().elapsed(), elapsed);

    release_tx.send(()).unwrap();
    let report = handle.wait().unwrap();
    assert!(report.aborted());
    assert_eq!(report.elapsed, elapsed);
}

#[test]
fn test_finish_after_completion_changes_nothing() {
    let dir = pairs_tree(1);
    let controller = ScanController::new();
    let report = controller
        .start(dir.path(), Arc::new(SilentObserver))
        .unwrap()
        .wait()
        .unwrap();
    assert!(report.completed());

    controller.finish();
    controller.cancel();
    assert!(!controller.is_scanning());
}

#[test]
fn test_finish_right_after_start_ends_idle() {
    for files in [0, 3] {
        let dir = pairs_tree(files);
        let controller = ScanController::new();
        let handle = controller
            .start(dir.path(), Arc::new(SilentObserver))
            .unwrap();
        controller.finish();

        let session = Arc::clone(handle.session());
        let report = handle.wait().unwrap();

        // A tiny tree may finish before the abort lands; either way it ends idle
        assert!(report.aborted() || report.completed());
        assert_eq!(report.progress.phase, Phase::Idle);
        assert_eq!(session.progress().phase(), Phase::Idle);
    }
}
