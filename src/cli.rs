//! Command-line interface definitions for dupsearch.
//!
//! Global options (verbosity, color, config file, error format) plus
//! subcommands, using the clap derive API.
//!
//! # Example
//!
//! ```bash
//! # Scan a directory, streaming duplicate sets as they are found
//! dupsearch scan ~/Downloads
//!
//! # One JSON object per duplicate set, for scripting
//! dupsearch scan ~/Downloads --output json
//!
//! # Move every copy but the first of each set to the trash
//! dupsearch scan ~/Downloads --delete
//!
//! # Show the effective configuration
//! dupsearch config
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use bytesize::ByteSize;

use crate::scanner::MAX_BUFFER_SIZE;

/// Find duplicate files by size and content hash.
#[derive(Debug, Parser)]
#[command(name = "dupsearch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory for duplicate files
    Scan(ScanArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory path to scan for duplicates
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Read buffer size for hashing (e.g. 64KiB, 1MiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub buffer_size: Option<u64>,

    /// Delete every file of each duplicate set except the first
    #[arg(long)]
    pub delete: bool,

    /// Use permanent deletion instead of moving to trash
    ///
    /// Warning: Files cannot be recovered after permanent deletion.
    #[arg(long, requires = "delete")]
    pub permanent: bool,

    /// Skip the deletion confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable progress and duplicate sets
    Text,
    /// One JSON object per duplicate set
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Accepts plain byte counts and `bytesize` suffixes (KB, KiB, MB, MiB, ...).
///
/// # Examples
///
/// ```
/// use dupsearch::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("64KiB").unwrap(), 65_536);
/// ```
///
/// # Errors
///
/// Returns a message when the string is not a valid size, is zero, or is
/// larger than [`MAX_BUFFER_SIZE`].
pub fn parse_size(s: &str) -> Result<u64, String> {
    let size: ByteSize = s
        .trim()
        .parse()
        .map_err(|e| format!("Invalid size '{}': {}", s, e))?;
    if size.as_u64() == 0 {
        return Err(format!("Size must be greater than zero: '{}'", s));
    }
    if size.as_u64() > MAX_BUFFER_SIZE as u64 {
        return Err(format!(
            "Size must be at most {}: '{}'",
            ByteSize::b(MAX_BUFFER_SIZE as u64),
            s
        ));
    }
    Ok(size.as_u64())
}
