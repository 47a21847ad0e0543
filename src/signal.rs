//! Ctrl+C handling.
//!
//! Ctrl+C is routed to the same cooperative cancellation path as any other
//! cancel request: the handler sets a process-wide interrupted flag and
//! cancels the scan of the attached [`CancelHandle`]. The pipeline stops at
//! its next checkpoint and the scan finishes as aborted.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dupsearch::controller::ScanController;
//! use dupsearch::signal::install_handler;
//!
//! let controller = ScanController::new();
//! let handler = install_handler().expect("Failed to install signal handler");
//! handler.attach(controller.cancel_handle());
//!
//! // ... run a scan ...
//!
//! if handler.is_shutdown_requested() {
//!     std::process::exit(130);
//! }
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::controller::CancelHandle;

/// Exit code for SIGINT (Ctrl+C) interruption (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Interrupted flag plus the scan to cancel on Ctrl+C.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
    target: Arc<Mutex<Option<CancelHandle>>>,
}

impl ShutdownHandler {
    /// Handler with no shutdown requested and nothing attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel scans of this controller on shutdown.
    pub fn attach(&self, handle: CancelHandle) {
        *self.target.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Whether Ctrl+C was pressed or `request_shutdown()` was called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Set the flag and cancel the attached scan.
    ///
    /// Returns `true` if a running scan was signalled.
    pub fn request_shutdown(&self) -> bool {
        self.flag.store(true, Ordering::SeqCst);
        self.target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(CancelHandle::cancel)
    }

    /// Clear the flag. Used when a handler is reused.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler.
///
/// The OS hook is registered once; later calls return the same handler with
/// its flag reset, so `run_app` can be called repeatedly (e.g. from tests).
///
/// # Errors
///
/// Returns [`SignalError::InstallFailed`] if another Ctrl+C hook was
/// registered outside this module.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = GLOBAL_HANDLER.get_or_init(ShutdownHandler::new).clone();
    let hooked = handler.clone();
    ctrlc::set_handler(move || {
        let cancelled = hooked.request_shutdown();

        let _ = writeln!(std::io::stderr(), "\nInterrupted. Cancelling scan...");
        let _ = std::io::stderr().flush();

        log::info!("Shutdown signal received (scan cancelled: {})", cancelled);
    })?;
    Ok(handler)
}
