//! Background scans through the controller: delivery, status, teardown.

use dupsearch::actions::delete::{delete_selected, DeleteConfig, DeleteError};
use dupsearch::controller::{ControllerError, ScanController};
use dupsearch::duplicates::DuplicateSet;
use dupsearch::progress::{Phase, ScanObserver, SilentObserver, StatusUpdate};
use dupsearch::session::{ScanReport, ScanStatus};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn write(root: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = root.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Tree with `n` duplicate pairs of distinct sizes.
fn pairs_tree(n: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    for i in 0..n {
        let content = vec![b'a' + (i % 26) as u8; i + 1];
        write(dir.path(), &format!("p{i}_a"), &content);
        write(dir.path(), &format!("p{i}_b"), &content);
    }
    dir
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    sets: Mutex<Vec<DuplicateSet>>,
    updates: Mutex<Vec<StatusUpdate>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl Recorder {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

impl ScanObserver for Recorder {
    fn on_duplicate_set(&self, set: &DuplicateSet) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.events.lock().unwrap().push("set".to_string());
        self.sets.lock().unwrap().push(set.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn on_status_update(&self, status: &StatusUpdate) {
        self.updates.lock().unwrap().push(status.clone());
    }

    fn on_scan_finished(&self, _report: &ScanReport) {
        self.events.lock().unwrap().push("finished".to_string());
    }
}

/// Blocks in the first `on_duplicate_set` until released.
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

fn gate() -> (Arc<Gate>, Receiver<()>, Sender<()>) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let gate = Arc::new(Gate {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    (gate, entered_rx, release_tx)
}

#[test]
fn test_controller_delivers_all_sets_then_finishes() {
    let dir = pairs_tree(4);
    let recorder = Arc::new(Recorder::default());

    let controller = ScanController::new().with_poll_interval(Duration::from_millis(5));
    let report = controller
        .start(dir.path(), recorder.clone())
        .unwrap()
        .wait()
        .unwrap();

    assert!(report.completed());
    assert_eq!(report.summary.duplicate_sets, 4);

    let events = recorder.events.lock().unwrap();
    assert_eq!(events.len(), 5);
    assert_eq!(events.last().map(String::as_str), Some("finished"));

    let sizes: Vec<u64> = recorder.sets.lock().unwrap().iter().map(|s| s.size).collect();
    assert_eq!(sizes, vec![4, 3, 2, 1]);
}

#[test]
fn test_controller_one_set_in_flight() {
    let dir = pairs_tree(5);
    let recorder = Arc::new(Recorder::with_delay(Duration::from_millis(10)));

    let controller = ScanController::new();
    controller
        .start(dir.path(), recorder.clone())
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(recorder.sets.lock().unwrap().len(), 5);
    assert_eq!(recorder.max_in_flight.load(Ordering::SeqCst), 1);
}

#[test]
fn test_controller_emits_status_updates() {
    let dir = pairs_tree(2);
    let recorder = Arc::new(Recorder::with_delay(Duration::from_millis(60)));

    let controller = ScanController::new().with_poll_interval(Duration::from_millis(5));
    controller
        .start(dir.path(), recorder.clone())
        .unwrap()
        .wait()
        .unwrap();

    let updates = recorder.updates.lock().unwrap();
    assert!(!updates.is_empty());
    assert!(updates.iter().all(|u| (1..=15).contains(&u.tick)));
    assert!(updates
        .iter()
        .filter(|u| u.phase == Phase::Hashing)
        .all(|u| u.percent.is_some_and(|p| (0.0..=100.0).contains(&p))));
}

#[test]
fn test_controller_no_updates_after_wait() {
    let dir = pairs_tree(2);
    let recorder = Arc::new(Recorder::default());

    let controller = ScanController::new().with_poll_interval(Duration::from_millis(2));
    controller
        .start(dir.path(), recorder.clone())
        .unwrap()
        .wait()
        .unwrap();

    let count = recorder.updates.lock().unwrap().len();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(recorder.updates.lock().unwrap().len(), count);
}

#[test]
fn test_controller_busy_while_scanning() {
    let dir = pairs_tree(1);
    let (gate, entered, release) = gate();

    let controller = ScanController::new();
    let handle = controller.start(dir.path(), gate).unwrap();
    entered.recv_timeout(Duration::from_secs(10)).unwrap();

    assert!(controller.is_scanning());
    assert!(matches!(
        controller.ensure_idle(),
        Err(ControllerError::ScanInProgress)
    ));
    let target = dir.path().join("p0_b");
    let result = delete_selected(
        &controller,
        std::slice::from_ref(&target),
        &|_: &[PathBuf]| true,
        &DeleteConfig::permanent(),
    );
    assert!(matches!(result, Err(DeleteError::ScanInProgress)));
    assert!(target.exists());

    release.send(()).unwrap();
    let report = handle.wait().unwrap();
    assert!(report.completed());
    assert!(controller.ensure_idle().is_ok());
}

#[test]
fn test_controller_restart_cancels_previous_scan() {
    let first_dir = pairs_tree(3);
    let second_dir = pairs_tree(1);
    let (gate, entered, release) = gate();

    let controller = ScanController::new();
    let first = controller.start(first_dir.path(), gate).unwrap();
    entered.recv_timeout(Duration::from_secs(10)).unwrap();

    let second = controller
        .start(second_dir.path(), Arc::new(SilentObserver))
        .unwrap();
    assert!(first.session().is_cancelled());

    release.send(()).unwrap();
    let first_report = first.wait().unwrap();
    let second_report = second.wait().unwrap();

    assert!(first_report.aborted());
    assert!(second_report.completed());
    assert_eq!(second_report.summary.duplicate_sets, 1);
    assert_eq!(second_report.root, second_dir.path());
}

#[test]
fn test_controller_start_selected_directory() {
    let dir = pairs_tree(2);
    let controller = ScanController::new();
    controller.set_directory(Some(dir.path().to_path_buf()));

    let report = controller
        .start_selected(Arc::new(SilentObserver))
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.summary.duplicate_sets, 2);
}
