//! Structured run logging utilities.
//!
//! Provides consistent, structured logging for export runs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

use reel_models::RunId;

/// Run logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    total_jobs: usize,
}

impl RunLogger {
    /// Create a new logger for a run with `total_jobs` eligible jobs.
    pub fn new(run_id: &RunId, total_jobs: usize) -> Self {
        Self {
            run_id: run_id.to_string(),
            total_jobs,
        }
    }

    /// Log the start of a run.
    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            total_jobs = self.total_jobs,
            "Export started: {}", message
        );
    }

    /// Log a progress update for a job.
    pub fn log_job(&self, job_index: u32, message: &str) {
        info!(
            run_id = %self.run_id,
            job_index,
            total_jobs = self.total_jobs,
            "Export progress: {}", message
        );
    }

    /// Log a non-fatal problem.
    pub fn log_warning(&self, message: &str) {
        warn!(run_id = %self.run_id, "Export warning: {}", message);
    }

    /// Log a fatal error.
    pub fn log_error(&self, message: &str) {
        error!(run_id = %self.run_id, "Export error: {}", message);
    }

    /// Log the completion of a run.
    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            total_jobs = self.total_jobs,
            "Export completed: {}", message
        );
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "export_run",
            run_id = %self.run_id,
            total_jobs = self.total_jobs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_creation() {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, 3);

        assert_eq!(logger.run_id, run_id.to_string());
        assert_eq!(logger.total_jobs, 3);
    }
}
