//! Per-file problems are skipped; root problems fail the scan.

use dupsearch::controller::ScanController;
use dupsearch::duplicates::{DuplicateFinder, FinderError};
use dupsearch::progress::SilentObserver;
use dupsearch::scanner::{FileRecord, ScanError};
use dupsearch::session::{ScanSession, ScanStatus};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

#[cfg(unix)]
fn make_unreadable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o000)).unwrap();
    // Privileged users can still read; such a run cannot exercise the skip
    fs::read_dir(path).is_err() && fs::read(path).is_err()
}

#[cfg(unix)]
fn restore(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode));
}

#[test]
#[cfg(unix)]
fn test_unreadable_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    fs::write(&a, b"locked").unwrap();
    fs::write(&b, b"locked").unwrap();

    if !make_unreadable(&a) {
        return;
    }
    make_unreadable(&b);

    let result = DuplicateFinder::with_defaults().scan(dir.path());
    restore(&a, 0o644);
    restore(&b, 0o644);
    let (sets, report) = result.unwrap();

    assert!(sets.is_empty());
    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.progress.skipped, 2);
    assert_eq!(report.progress.processed_files, report.progress.total_files);
}

#[test]
#[cfg(unix)]
fn test_unreadable_member_leaves_rest_of_set() {
    let dir = TempDir::new().unwrap();
    let locked = dir.path().join("locked");
    fs::write(&locked, b"content").unwrap();
    fs::write(dir.path().join("open1"), b"content").unwrap();
    fs::write(dir.path().join("open2"), b"content").unwrap();

    if !make_unreadable(&locked) {
        return;
    }

    let result = DuplicateFinder::with_defaults().scan(dir.path());
    restore(&locked, 0o644);
    let (sets, report) = result.unwrap();

    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].len(), 2);
    assert!(!sets[0].paths.contains(&locked));
    assert!(report.completed());
    assert_eq!(report.progress.skipped, 1);
}

#[test]
#[cfg(unix)]
fn test_unreadable_directory_is_skipped() {
    let dir = TempDir::new().unwrap();
    let sub = dir.path().join("private");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("hidden_copy"), b"dup").unwrap();
    fs::write(dir.path().join("x"), b"dup").unwrap();
    fs::write(dir.path().join("y"), b"dup").unwrap();

    if !make_unreadable(&sub) {
        restore(&sub, 0o755);
        return;
    }

    let result = DuplicateFinder::with_defaults().scan(dir.path());
    restore(&sub, 0o755);
    let (sets, report) = result.unwrap();

    assert!(report.completed());
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].len(), 2);
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("gone");

    let result = DuplicateFinder::with_defaults().scan(&missing);
    assert!(matches!(
        result,
        Err(FinderError::ScanError(ScanError::NotFound(_)))
    ));

    let report = ScanController::new()
        .start(&missing, Arc::new(SilentObserver))
        .unwrap()
        .wait()
        .unwrap();
    assert!(matches!(report.status, ScanStatus::Failed(_)));
}

#[test]
fn test_file_root_is_not_a_directory() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("file.txt");
    fs::write(&file, b"not a dir").unwrap();

    let result = DuplicateFinder::with_defaults().scan(&file);
    assert!(matches!(
        result,
        Err(FinderError::ScanError(ScanError::NotADirectory(_)))
    ));
}

#[test]
fn test_empty_files_form_a_set() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("e1"), b"").unwrap();
    fs::write(dir.path().join("e2"), b"").unwrap();
    fs::write(dir.path().join("full"), b"x").unwrap();

    let (sets, report) = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].size, 0);
    assert_eq!(sets[0].wasted_space(), 0);
    assert!(report.completed());
}

#[test]
fn test_vanished_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    let records = vec![
        FileRecord::new(dir.path().join("gone_a"), 6),
        FileRecord::new(dir.path().join("gone_b"), 6),
    ];

    let session = ScanSession::new(dir.path());
    let mut sets = Vec::new();
    let summary = DuplicateFinder::with_defaults()
        .find_duplicates_from_records(records, &session, |set| sets.push(set));
    session.finish(ScanStatus::Completed);
    let report = session.report(summary);

    assert!(sets.is_empty());
    assert_eq!(report.status, ScanStatus::Completed);
    assert!(!report.aborted());
    assert!(!report.summary.interrupted);
    assert_eq!(report.progress.skipped, 2);
    assert_eq!(report.progress.total_files, 2);
    assert_eq!(report.progress.processed_files, report.progress.total_files);
    assert_eq!(report.progress.processed_bytes, report.progress.total_bytes);
}

#[test]
fn test_vanished_member_leaves_rest_of_set() {
    let dir = TempDir::new().unwrap();
    let kept_a = dir.path().join("kept_a");
    let kept_b = dir.path().join("kept_b");
    fs::write(&kept_a, b"content").unwrap();
    fs::write(&kept_b, b"content").unwrap();
    let records = vec![
        FileRecord::new(kept_a.clone(), 7),
        FileRecord::new(dir.path().join("gone"), 7),
        FileRecord::new(kept_b.clone(), 7),
    ];

    let session = ScanSession::new(dir.path());
    let mut sets = Vec::new();
    let summary = DuplicateFinder::with_defaults()
        .find_duplicates_from_records(records, &session, |set| sets.push(set));

    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].paths, vec![kept_a, kept_b]);
    assert_eq!(summary.duplicate_sets, 1);
    assert_eq!(session.progress().snapshot().skipped, 1);
}
