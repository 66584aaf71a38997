//! Run-wide progress aggregation.

use std::sync::atomic::{AtomicU8, Ordering};

/// Highest percentage reported before the run completes.
pub const MAX_RUNNING_PERCENT: u8 = 99;

/// Converts per-job encoder fractions into an overall percentage.
///
/// The value never decreases, stays at or below 99 while jobs run and
/// reaches 100 only through [`ProgressTracker::complete`]. Shared between
/// the orchestrator and the encoder's progress callback.
#[derive(Debug)]
pub struct ProgressTracker {
    total_jobs: u32,
    percent: AtomicU8,
}

impl ProgressTracker {
    pub fn new(total_jobs: u32) -> Self {
        Self {
            total_jobs: total_jobs.max(1),
            percent: AtomicU8::new(0),
        }
    }

    pub fn total_jobs(&self) -> u32 {
        self.total_jobs
    }

    /// Current percentage.
    pub fn current(&self) -> u8 {
        self.percent.load(Ordering::SeqCst)
    }

    /// Percentage at run start.
    pub fn start(&self) -> u8 {
        self.current()
    }

    /// Percentage when job `index` (1-based) begins.
    pub fn job_started(&self, index: u32) -> u8 {
        self.advance(self.running_percent(index, 0.0));
        self.current()
    }

    /// Record an encoder tick for job `index`.
    ///
    /// Returns the new percentage only if it advanced.
    pub fn tick(&self, index: u32, fraction: f64) -> Option<u8> {
        let target = self.running_percent(index, fraction);
        let previous = self.advance(target);
        (target > previous).then_some(target)
    }

    /// Percentage once job `index` is finished and delivered.
    pub fn job_finished(&self, index: u32) -> u8 {
        self.advance(self.running_percent(index, 1.0));
        self.current()
    }

    /// Mark the run complete.
    pub fn complete(&self) -> u8 {
        self.percent.store(100, Ordering::SeqCst);
        100
    }

    /// `floor(((index - 1) + fraction) / total * 100)`, capped at 99.
    fn running_percent(&self, index: u32, fraction: f64) -> u8 {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let done = index.saturating_sub(1) as f64 + fraction;
        let percent = (done / self.total_jobs as f64 * 100.0).floor();
        percent.clamp(0.0, MAX_RUNNING_PERCENT as f64) as u8
    }

    fn advance(&self, target: u8) -> u8 {
        self.percent.fetch_max(target, Ordering::SeqCst)
    }
}
