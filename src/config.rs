//! Application configuration management.
//!
//! Settings are layered with `figment`, later layers winning:
//!
//! 1. Built-in defaults
//! 2. TOML config file (platform config dir, or `--config PATH`)
//! 3. `DUPSEARCH_*` environment variables
//! 4. CLI flags (see [`Config::merge_scan_args`])
//!
//! ```toml
//! poll_interval_ms = 100
//! read_buffer_size = 65536
//! skip_hidden = false
//! delete_to_trash = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::ScanArgs;
use crate::duplicates::FinderConfig;
use crate::scanner::{WalkerConfig, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DUPSEARCH_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interval between status updates, in milliseconds.
    pub poll_interval_ms: u64,
    /// Read buffer size for hashing, in bytes.
    pub read_buffer_size: usize,
    /// Skip hidden files and directories.
    pub skip_hidden: bool,
    /// Move deleted files to the trash instead of removing them.
    pub delete_to_trash: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            skip_hidden: false,
            delete_to_trash: true,
        }
    }
}

impl Config {
    /// Load from the default platform-specific path, falling back to
    /// defaults (plus environment) on any error.
    #[must_use]
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Self::load_from_path(Path::new("")),
        }
    }

    /// Load from `path`; a missing file is not an error.
    #[must_use]
    pub fn load_from_path(path: &Path) -> Self {
        match Self::try_load_from_path(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Invalid configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Load from `path`, reporting parse and type errors.
    ///
    /// # Errors
    ///
    /// Returns the `figment` error for malformed TOML or bad values.
    pub fn try_load_from_path(path: &Path) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if path.is_file() {
            log::debug!("Loading config from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX)).extract()
    }

    /// Default platform-specific config file path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "dupsearch", "dupsearch")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply scan flags on top of the loaded layers.
    pub fn merge_scan_args(&mut self, args: &ScanArgs) {
        if args.skip_hidden {
            self.skip_hidden = true;
        }
        if args.permanent {
            self.delete_to_trash = false;
        }
        if let Some(size) = args.buffer_size {
            self.read_buffer_size = usize::try_from(size).unwrap_or(usize::MAX);
        }
    }

    /// Status poll interval (at least 1 ms).
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Finder configuration derived from these settings.
    ///
    /// The read buffer is clamped to `1..=MAX_BUFFER_SIZE`; larger values
    /// can still arrive from the config file or the environment.
    #[must_use]
    pub fn finder_config(&self) -> FinderConfig {
        let buffer_size = self.read_buffer_size.clamp(1, MAX_BUFFER_SIZE);
        if buffer_size != self.read_buffer_size {
            log::warn!(
                "read_buffer_size {} out of range, using {}",
                self.read_buffer_size,
                buffer_size
            );
        }
        FinderConfig::default()
            .with_walker_config(WalkerConfig::default().with_skip_hidden(self.skip_hidden))
            .with_read_buffer_size(buffer_size)
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns the serializer error (not expected for this type).
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
