//! Shared data models for the batch reel exporter.
//!
//! This crate provides Serde-serializable types for:
//! - Background, demo and audio media sources
//! - Text overlay configuration
//! - The predefined music catalog and music selection
//! - Encoding configuration and composition constants
//! - Export requests and status events

pub mod encoding;
pub mod media;
pub mod music;
pub mod request;
pub mod status;
pub mod text;

// Re-export common types
pub use encoding::{
    EncodingConfig, OVERLAY_EDGE_MARGIN, TARGET_FPS, TARGET_HEIGHT, TARGET_WIDTH,
    TEXT_ANCHOR_MARGIN,
};
pub use media::{BackgroundClip, DemoClip, MediaKind, MediaSource};
pub use music::{AudioUpload, MusicSelection, MusicTrack, TrackCatalog, DEFAULT_AUDIO_EXTENSION};
pub use request::{export_file_name, ExportRequest};
pub use status::{RunId, RunState, StatusEvent};
pub use text::{ParseOptionError, TextOverlayConfig, TextPosition, TextSize};
