//! dupsearch - duplicate file finder
//!
//! Finds duplicate files beneath a directory by bucketing files by size and
//! comparing BLAKE3 content hashes within each bucket. Duplicate sets are
//! reported incrementally while the scan runs, largest files first, and the
//! scan can be cancelled cooperatively at any point.
//!
//! # Example
//!
//! ```no_run
//! use dupsearch::duplicates::DuplicateFinder;
//! use std::path::Path;
//!
//! let (sets, report) = DuplicateFinder::with_defaults().scan(Path::new(".")).unwrap();
//! println!("{} duplicate sets in {:.1} sec", sets.len(), report.elapsed_secs());
//! ```

pub mod actions;
pub mod cli;
pub mod config;
pub mod controller;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod session;
pub mod signal;

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::actions::delete::{
    delete_selected, select_for_deletion, DeleteConfig, StdinConfirmation,
};
use crate::cli::{Cli, Commands, OutputFormat, ScanArgs};
use crate::config::Config;
use crate::controller::ScanController;
use crate::error::ExitCode;
use crate::output::{Collector, ConsoleReporter, JsonReporter};
use crate::progress::ScanObserver;
use crate::session::ScanStatus;

/// Run the command line application.
///
/// # Errors
///
/// Returns an error for invalid configuration, an inaccessible scan root,
/// or a failed scan thread. Per-file problems are not errors; they show up
/// in the exit code.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, cli.no_color);

    let config = match &cli.config {
        Some(path) => {
            if !path.is_file() {
                bail!("Config file not found: {}", path.display());
            }
            Config::try_load_from_path(path)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        }
        None => Config::load(),
    };

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml().context("Failed to render config")?);
            Ok(ExitCode::Success)
        }
        Commands::Scan(ref args) => {
            let mut config = config;
            config.merge_scan_args(args);
            match args.output {
                OutputFormat::Text => {
                    let reporter = ConsoleReporter::new(&args.path, cli.quiet, cli.no_color);
                    run_scan(reporter, args, &config)
                }
                OutputFormat::Json => run_scan(JsonReporter::stdout(), args, &config),
            }
        }
    }
}

fn run_scan<O: ScanObserver + 'static>(
    reporter: O,
    args: &ScanArgs,
    config: &Config,
) -> Result<ExitCode> {
    let controller = ScanController::new()
        .with_finder_config(config.finder_config())
        .with_poll_interval(config.poll_interval());

    match signal::install_handler() {
        Ok(handler) => handler.attach(controller.cancel_handle()),
        Err(e) => log::warn!("Ctrl+C will not cancel the scan: {}", e),
    }

    let collector = Arc::new(Collector::new(reporter));
    let report = controller
        .start(&args.path, collector.clone())
        .context("Failed to start scan")?
        .wait()?;

    if let ScanStatus::Failed(reason) = &report.status {
        bail!("Cannot scan {}: {}", args.path.display(), reason);
    }

    let mut exit_code = ExitCode::from_report(&report);
    if args.delete {
        if report.aborted() {
            log::warn!("Scan was interrupted, nothing deleted");
            return Ok(exit_code);
        }
        let selected = select_for_deletion(&collector.take_sets())?;
        let delete_config = if config.delete_to_trash {
            DeleteConfig::trash()
        } else {
            DeleteConfig::permanent()
        };
        let confirmation = StdinConfirmation::new(args.yes);
        if let Some(result) = delete_selected(&controller, &selected, &confirmation, &delete_config)? {
            eprintln!("{}", result.summary());
            if !result.all_succeeded() {
                exit_code = ExitCode::PartialSuccess;
            }
        }
    }
    Ok(exit_code)
}
