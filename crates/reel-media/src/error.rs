//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found: {0}")]
    FfmpegNotFound(String),

    #[error("FFprobe not found: {0}")]
    FfprobeNotFound(String),

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Encoding engine is not ready")]
    EngineNotReady,

    #[error("Working file not found: {0}")]
    WorkingFileMissing(String),

    #[error("Invalid working file name: {0}")]
    InvalidWorkingFileName(String),

    #[error("Overlay render failed: {0}")]
    OverlayRender(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Image encode error: {0}")]
    Image(#[from] image::ImageError),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an overlay render error.
    pub fn overlay_render(message: impl Into<String>) -> Self {
        Self::OverlayRender(message.into())
    }

    /// Check if the error came from an encoder invocation (as opposed to setup or IO).
    pub fn is_encode_failure(&self) -> bool {
        matches!(self, MediaError::FfmpegFailed { .. } | MediaError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_failure_classification() {
        assert!(MediaError::ffmpeg_failed("boom", None, Some(1)).is_encode_failure());
        assert!(MediaError::Timeout(30).is_encode_failure());
        assert!(!MediaError::EngineNotReady.is_encode_failure());
        assert!(!MediaError::WorkingFileMissing("out.mp4".into()).is_encode_failure());
    }

    #[test]
    fn test_display() {
        let err = MediaError::ffmpeg_failed("exit 1", Some("stderr".into()), Some(1));
        assert_eq!(err.to_string(), "FFmpeg command failed: exit 1");
    }
}
