//! Export error types.

use thiserror::Error;

use reel_media::MediaError;

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Export rejected: {0}")]
    Precondition(String),

    #[error("An export is already running")]
    AlreadyRunning,

    #[error("Resolution failed: {0}")]
    Resolution(String),

    #[error("Job {job_index} failed: {source}")]
    JobFatal {
        job_index: u32,
        #[source]
        source: MediaError,
    },

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("export cancelled")]
    Cancelled,

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    pub fn job_fatal(job_index: u32, source: MediaError) -> Self {
        Self::JobFatal { job_index, source }
    }

    /// Check if the run was rejected before it started.
    ///
    /// Rejections emit no status events; every other error is reported once
    /// as a `failed` event.
    pub fn is_precondition(&self) -> bool {
        matches!(self, ExportError::Precondition(_) | ExportError::AlreadyRunning)
    }

    /// Job index the failure belongs to, if any.
    pub fn job_index(&self) -> Option<u32> {
        match self {
            ExportError::JobFatal { job_index, .. } => Some(*job_index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_classification() {
        assert!(ExportError::precondition("no demo").is_precondition());
        assert!(ExportError::AlreadyRunning.is_precondition());
        assert!(!ExportError::resolution("404").is_precondition());
        assert!(!ExportError::Cancelled.is_precondition());
    }

    #[test]
    fn test_job_fatal() {
        let err = ExportError::job_fatal(2, MediaError::ffmpeg_failed("exit 1", None, Some(1)));
        assert_eq!(err.job_index(), Some(2));
        assert_eq!(err.to_string(), "Job 2 failed: FFmpeg command failed: exit 1");
        assert_eq!(ExportError::Cancelled.to_string(), "export cancelled");
    }
}
