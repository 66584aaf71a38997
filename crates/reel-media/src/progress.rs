//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fraction of the job encoded, given the expected output duration in milliseconds.
    ///
    /// Always within `[0, 1]`; a finished encode reports `1.0` even if the
    /// expected duration was unknown.
    pub fn fraction_of(&self, total_duration_ms: i64) -> f64 {
        if self.is_complete {
            return 1.0;
        }
        if total_duration_ms <= 0 || self.out_time_ms <= 0 {
            return 0.0;
        }
        (self.out_time_ms as f64 / total_duration_ms as f64).clamp(0.0, 1.0)
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(FfmpegProgress) + Send + Sync + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };

        assert!((progress.fraction_of(10000) - 0.5).abs() < 1e-9);
        assert!((progress.fraction_of(2500) - 1.0).abs() < 1e-9);
        assert_eq!(progress.fraction_of(0), 0.0);
    }

    #[test]
    fn test_fraction_complete() {
        let progress = FfmpegProgress {
            is_complete: true,
            ..Default::default()
        };
        assert_eq!(progress.fraction_of(0), 1.0);
    }

    #[test]
    fn test_negative_out_time() {
        // ffmpeg reports negative out_time before the first packet
        let progress = FfmpegProgress {
            out_time_ms: -40,
            ..Default::default()
        };
        assert_eq!(progress.fraction_of(10000), 0.0);
    }
}
