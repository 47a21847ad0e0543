//! Human-readable console reporter.
//!
//! Shows the polled status line on an `indicatif` spinner and prints every
//! duplicate set above it as soon as it arrives:
//!
//! ```text
//! Scanning '.../home/user/Downloads' ...
//! 2 duplicates 1.0 MiB each
//!     /home/user/Downloads/a.iso
//!     /home/user/Downloads/copy of a.iso
//! Scanned '.../home/user/Downloads' in 1.234 sec
//! ```

use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::duplicates::DuplicateSet;
use crate::progress::{ScanObserver, StatusUpdate};
use crate::session::{ScanReport, ScanStatus};

/// Number of trailing characters of the directory shown in messages.
const DIR_LABEL_CHARS: usize = 50;

/// Quoted directory label: `'...` plus the last 50 characters of the path.
#[must_use]
pub fn short_dir_label(path: &Path) -> String {
    let full = path.display().to_string();
    let count = full.chars().count();
    let tail: String = full
        .chars()
        .skip(count.saturating_sub(DIR_LABEL_CHARS))
        .collect();
    format!("'...{}'", tail)
}

/// Header line of a duplicate set.
#[must_use]
pub fn set_header(set: &DuplicateSet) -> String {
    format!("{} duplicates {} each", set.len(), set.size_display())
}

/// Final line for a finished scan.
#[must_use]
pub fn finish_message(report: &ScanReport) -> String {
    let label = short_dir_label(&report.root);
    let secs = report.elapsed_secs();
    match &report.status {
        ScanStatus::Completed => format!("Scanned {} in {:.3} sec", label, secs),
        ScanStatus::Aborted => format!("Scanning {} aborted, took {:.3} sec", label, secs),
        ScanStatus::Failed(reason) => {
            format!("Scanning {} failed after {:.3} sec: {}", label, secs, reason)
        }
    }
}

/// Console observer with a status spinner.
pub struct ConsoleReporter {
    bar: ProgressBar,
    quiet: bool,
}

impl ConsoleReporter {
    /// Reporter for a scan of `root`. `quiet` hides the spinner and the
    /// start and finish lines; duplicate sets are still printed. `plain`
    /// drops the colored spinner glyph.
    #[must_use]
    pub fn new(root: &Path, quiet: bool, plain: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(Self::status_style(plain));
            bar.enable_steady_tick(Duration::from_millis(120));
            bar.println(format!("Scanning {} ...", short_dir_label(root)));
            bar
        };
        Self { bar, quiet }
    }

    fn status_style(plain: bool) -> ProgressStyle {
        if plain {
            ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
        } else {
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
        }
    }
}

impl ScanObserver for ConsoleReporter {
    fn on_duplicate_set(&self, set: &DuplicateSet) {
        let mut block = set_header(set);
        for path in &set.paths {
            block.push_str("\n    ");
            block.push_str(&path.display().to_string());
        }
        if self.bar.is_hidden() {
            println!("{}", block);
        } else {
            self.bar.suspend(|| println!("{}", block));
        }
    }

    fn on_status_update(&self, status: &StatusUpdate) {
        self.bar.set_message(status.to_string());
    }

    fn on_scan_finished(&self, report: &ScanReport) {
        self.bar.finish_and_clear();
        if !self.quiet {
            eprintln!("{}", finish_message(report));
            if report.progress.skipped > 0 {
                eprintln!("{} entries could not be read", report.progress.skipped);
            }
        }
    }
}
