//! Progress reporting for scans.
//!
//! The scanner reports through the [`ProgressCallback`] trait; [`Progress`]
//! renders it as an indicatif bar per search path. Quiet mode and non-terminal
//! output show nothing.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Receives progress updates while scanning.
pub trait ProgressCallback: Send + Sync {
    /// A phase (one search path) starts with `total` candidates.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// `current` files of the phase are done; `path` was the latest.
    fn on_progress(&self, current: usize, path: &str);

    /// The phase finished.
    fn on_phase_end(&self, phase: &str);
}

/// Terminal progress bars.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a reporter. With `quiet` set nothing is drawn.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        bar.set_style(Self::style());
        bar.set_message(phase.to_string());
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(old) = slot.replace(bar) {
                old.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, current: usize, _path: &str) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(ref bar) = *slot {
                bar.set_position(current as u64);
            }
        }
    }

    fn on_phase_end(&self, _phase: &str) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}
