//! FFmpeg CLI wrapper for reel composition.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building for multi-input jobs
//! - Progress parsing from `-progress pipe:2`
//! - The composition filter graph (normalize, concat, overlay, looped audio)
//! - Text overlay rasterization
//! - The encoding engine with its named working storage

pub mod command;
pub mod engine;
pub mod error;
pub mod filters;
pub mod overlay;
pub mod probe;
pub mod progress;

pub use command::{substitute_video_codec, FfmpegCommand, FfmpegRunner, InputSpec};
pub use engine::{EncodeEngine, EngineConfig, FfmpegEngine};
pub use error::{MediaError, MediaResult};
pub use filters::{
    music_file_name, FilterGraph, BACKGROUND_FILE, DEMO_FILE, OUTPUT_FILE, OVERLAY_FILE,
};
pub use overlay::{
    layout_overlay, wrap_lines, OverlayLayout, OverlayRasterizer, OverlayRenderer, TextMeasure,
};
pub use probe::{probe_media, MediaInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
