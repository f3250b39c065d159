//! Ctrl+C handling.
//!
//! A single process-wide handler sets a shared `AtomicBool`. The scanner
//! stops starting new files and the resolver stops between reference records
//! once it is set; work already committed to the store stays valid.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// A handler with no signal hook attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether shutdown was requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request shutdown manually.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to hand to the scanner and resolver.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

static INSTALLED: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the Ctrl+C hook once per process and return its handler.
///
/// Repeated calls (several `run_app` invocations in one test binary) get the
/// same handler back with the flag cleared. If the hook cannot be installed,
/// an unhooked handler is returned so manual shutdown still works.
pub fn install_handler() -> ShutdownHandler {
    let handler = INSTALLED.get_or_init(|| {
        let handler = ShutdownHandler::new();
        let flag = handler.get_flag();
        let hooked = ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "\nInterrupted. Finishing current files...");
            let _ = stderr.flush();
        });
        if let Err(e) = hooked {
            log::debug!("Ctrl+C handler not installed: {}", e);
        }
        handler
    });
    handler.reset();
    handler.clone()
}
