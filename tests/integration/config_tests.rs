//! Layered configuration: defaults, TOML file, environment.

use dupsearch::config::{Config, ENV_PREFIX};
use std::env;
use std::fs;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

// Environment variables are process-wide
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "POLL_INTERVAL_MS",
        "READ_BUFFER_SIZE",
        "SKIP_HIDDEN",
        "DELETE_TO_TRASH",
    ] {
        env::remove_var(format!("{ENV_PREFIX}{key}"));
    }
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let dir = TempDir::new().unwrap();
    let config = Config::try_load_from_path(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_file_overrides_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "poll_interval_ms = 250\nskip_hidden = true\n").unwrap();

    let config = Config::try_load_from_path(&path).unwrap();
    assert_eq!(config.poll_interval(), Duration::from_millis(250));
    assert!(config.skip_hidden);
    assert_eq!(config.read_buffer_size, Config::default().read_buffer_size);
    assert!(config.finder_config().walker_config.skip_hidden);
}

#[test]
fn test_config_env_overrides_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "skip_hidden = true\nread_buffer_size = 1024\n").unwrap();

    env::set_var(format!("{ENV_PREFIX}SKIP_HIDDEN"), "false");
    let result = Config::try_load_from_path(&path);
    clear_env();

    let config = result.unwrap();
    assert!(!config.skip_hidden);
    assert_eq!(config.read_buffer_size, 1024);
}

#[test]
fn test_config_invalid_toml_is_an_error() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "poll_interval_ms = \"soon\"\n").unwrap();

    assert!(Config::try_load_from_path(&path).is_err());
    assert_eq!(Config::load_from_path(&path), Config::default());
}

#[test]
fn test_config_renders_back_to_toml() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let original = Config {
        poll_interval_ms: 40,
        read_buffer_size: 8192,
        skip_hidden: true,
        delete_to_trash: false,
    };
    fs::write(&path, original.to_toml().unwrap()).unwrap();

    assert_eq!(Config::try_load_from_path(&path).unwrap(), original);
}
