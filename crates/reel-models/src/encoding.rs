//! Video encoding configuration.

use serde::{Deserialize, Serialize};

/// Output frame width in pixels (portrait).
pub const TARGET_WIDTH: u32 = 1080;
/// Output frame height in pixels (portrait).
pub const TARGET_HEIGHT: u32 = 1920;
/// Output frame rate.
pub const TARGET_FPS: u32 = 30;

/// Distance of the text anchor from the top/bottom edge of the overlay canvas.
pub const TEXT_ANCHOR_MARGIN: u32 = 200;
/// Distance of the composited overlay from the top/bottom edge of the frame.
pub const OVERLAY_EDGE_MARGIN: u32 = 120;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Codec substituted when the primary codec invocation fails
pub const DEFAULT_FALLBACK_CODEC: &str = "mpeg4";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "veryfast";
/// Default output pixel format (planar 8-bit 4:2:0)
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Primary video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Video codec tried once when the primary codec fails
    #[serde(default = "default_fallback_codec")]
    pub fallback_codec: String,

    /// Encoding preset (e.g., "veryfast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Output pixel format
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Audio codec, used only when the job carries audio
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate, used only when the job carries audio
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_fallback_codec() -> String {
    DEFAULT_FALLBACK_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            fallback_codec: default_fallback_codec(),
            preset: default_preset(),
            pixel_format: default_pixel_format(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

impl EncodingConfig {
    /// Returns a new config with a different primary codec.
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    /// Returns a new config with a different fallback codec.
    pub fn with_fallback_codec(mut self, codec: impl Into<String>) -> Self {
        self.fallback_codec = codec.into();
        self
    }

    /// Returns a new config with a different preset.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Video output arguments: pixel format, codec and preset.
    pub fn video_args(&self) -> Vec<String> {
        vec![
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
        ]
    }

    /// Audio output arguments: codec and bitrate.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }
}
