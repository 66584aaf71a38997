//! Export configuration.

use std::path::PathBuf;
use std::time::Duration;

use reel_media::EngineConfig;
use reel_models::EncodingConfig;

/// Export configuration.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Parent directory for the encoder's working storage (system temp if unset)
    pub work_dir: Option<PathBuf>,
    /// Directory delivered files are written to
    pub output_dir: PathBuf,
    /// FFmpeg executable
    pub ffmpeg_binary: String,
    /// FFprobe executable
    pub ffprobe_binary: String,
    /// Per-encode timeout (none if unset)
    pub encode_timeout: Option<Duration>,
    /// Status event channel capacity
    pub event_capacity: usize,
    /// Timeout for fetching catalog tracks
    pub fetch_timeout: Duration,
    /// Encoder settings shared by every job
    pub encoding: EncodingConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            output_dir: PathBuf::from("exports"),
            ffmpeg_binary: "ffmpeg".to_string(),
            ffprobe_binary: "ffprobe".to_string(),
            encode_timeout: None,
            event_capacity: 64,
            fetch_timeout: Duration::from_secs(60),
            encoding: EncodingConfig::default(),
        }
    }
}

impl ExportConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut encoding = defaults.encoding.clone();
        if let Ok(codec) = std::env::var("REEL_VIDEO_CODEC") {
            encoding = encoding.with_codec(codec);
        }
        if let Ok(codec) = std::env::var("REEL_FALLBACK_CODEC") {
            encoding = encoding.with_fallback_codec(codec);
        }
        if let Ok(preset) = std::env::var("REEL_PRESET") {
            encoding = encoding.with_preset(preset);
        }

        Self {
            work_dir: std::env::var("REEL_WORK_DIR").ok().map(PathBuf::from),
            output_dir: std::env::var("REEL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            ffmpeg_binary: std::env::var("REEL_FFMPEG").unwrap_or(defaults.ffmpeg_binary),
            ffprobe_binary: std::env::var("REEL_FFPROBE").unwrap_or(defaults.ffprobe_binary),
            encode_timeout: std::env::var("REEL_ENCODE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            event_capacity: std::env::var("REEL_EVENT_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.event_capacity),
            fetch_timeout: Duration::from_secs(
                std::env::var("REEL_FETCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            encoding,
        }
    }

    /// Engine settings derived from this config.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            ffmpeg_binary: self.ffmpeg_binary.clone(),
            ffprobe_binary: self.ffprobe_binary.clone(),
            work_parent: self.work_dir.clone(),
            timeout_secs: self.encode_timeout.map(|d| d.as_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.event_capacity, 64);
        assert_eq!(config.encoding.codec, "libx264");
        assert_eq!(config.encoding.fallback_codec, "mpeg4");
        assert!(config.encode_timeout.is_none());
    }

    #[test]
    fn test_engine_config() {
        let config = ExportConfig {
            work_dir: Some(PathBuf::from("/var/tmp/reel")),
            encode_timeout: Some(Duration::from_secs(600)),
            ..Default::default()
        };

        let engine = config.engine_config();
        assert_eq!(engine.work_parent, Some(PathBuf::from("/var/tmp/reel")));
        assert_eq!(engine.timeout_secs, Some(600));
        assert_eq!(engine.ffmpeg_binary, "ffmpeg");
    }
}
