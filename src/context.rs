use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use log::error;

/// Operator feedback during a scan. Every method may be a no-op.
pub trait ProgressSink: Send + Sync {
    /// Called at most once per rate-limit period while walking.
    fn on_walk(&self, _visited: usize, _current: &Path) {}

    /// Called after a size group finishes both hashing stages.
    fn on_group_done(&self, _done: usize, _total: usize) {}

    fn finish(&self) {}
}

/// Spinner on stderr used by the binary.
pub struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { bar }
    }
}

impl Default for SpinnerProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for SpinnerProgress {
    fn on_walk(&self, visited: usize, current: &Path) {
        self.bar.set_message(format!(
            "Scanning [{}]: {}",
            HumanCount(visited as u64),
            current.display()
        ));
    }

    fn on_group_done(&self, done: usize, total: usize) {
        self.bar
            .set_message(format!("Hashing size groups {done}/{total}"));
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Services shared by every stage of a run: created once at startup and
/// passed by reference into the scanner, pipeline and recycle step.
#[derive(Default)]
pub struct ScanContext {
    progress: Option<Arc<dyn ProgressSink>>,
    auto_yes: bool,
    problems: AtomicUsize,
    interrupted: Arc<AtomicBool>,
}

impl ScanContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn with_auto_yes(mut self, auto_yes: bool) -> Self {
        self.auto_yes = auto_yes;
        self
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }

    pub fn progress(&self) -> Option<&dyn ProgressSink> {
        self.progress.as_deref()
    }

    /// Logs a non-fatal problem and counts it.
    pub fn problem(&self, message: fmt::Arguments<'_>) {
        self.problems.fetch_add(1, Ordering::Relaxed);
        error!("{message}");
    }

    pub fn problem_count(&self) -> usize {
        self.problems.load(Ordering::Relaxed)
    }

    /// Flag flipped by the Ctrl-C handler.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }
}
