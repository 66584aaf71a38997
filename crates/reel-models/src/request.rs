//! Export request definitions.

use serde::{Deserialize, Serialize};

use crate::media::{BackgroundClip, DemoClip};
use crate::music::MusicSelection;
use crate::text::TextOverlayConfig;

/// Suffix appended to every delivered file stem.
pub const EXPORT_SUFFIX: &str = "_export.mp4";

/// Everything one export run needs, captured up front.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExportRequest {
    /// Backgrounds in upload order
    pub backgrounds: Vec<BackgroundClip>,
    /// Demo clip appended after each background; required
    pub demo: Option<DemoClip>,
    /// Optional text overlay
    #[serde(default)]
    pub overlay: Option<TextOverlayConfig>,
    #[serde(default)]
    pub music: MusicSelection,
}

impl ExportRequest {
    pub fn new(backgrounds: Vec<BackgroundClip>, demo: DemoClip) -> Self {
        Self {
            backgrounds,
            demo: Some(demo),
            overlay: None,
            music: MusicSelection::None,
        }
    }

    pub fn with_overlay(mut self, overlay: TextOverlayConfig) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_music(mut self, music: MusicSelection) -> Self {
        self.music = music;
        self
    }

    /// Replace the demo clip.
    pub fn with_demo(mut self, demo: DemoClip) -> Self {
        self.demo = Some(demo);
        self
    }

    /// Overlay config if it has visible content.
    pub fn effective_overlay(&self) -> Option<&TextOverlayConfig> {
        self.overlay.as_ref().filter(|o| !o.is_empty())
    }

    /// Backgrounds of video kind, in upload order.
    pub fn video_backgrounds(&self) -> impl Iterator<Item = &BackgroundClip> {
        self.backgrounds.iter().filter(|b| b.kind.is_video())
    }

    /// Number of backgrounds that will be skipped because they are not videos.
    pub fn skipped_count(&self) -> usize {
        self.backgrounds.iter().filter(|b| !b.kind.is_video()).count()
    }
}

/// Deliverable file name for a background: the original name without its
/// final extension, suffixed with `_export.mp4`.
///
/// `index` is the 1-based job index, used only when the name is empty. A
/// bare extension such as `.mp4` leaves an empty stem.
pub fn export_file_name(original_name: &str, index: usize) -> String {
    if original_name.is_empty() {
        return format!("background_{}{}", index, EXPORT_SUFFIX);
    }

    let stem = match original_name.rfind('.') {
        Some(dot) if !original_name[dot + 1..].is_empty() && !original_name[dot + 1..].contains('/') => {
            &original_name[..dot]
        }
        _ => original_name,
    };
    format!("{}{}", stem, EXPORT_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaKind, MediaSource};
    use crate::text::{TextPosition, TextSize};

    fn clip(name: &str, kind: MediaKind) -> BackgroundClip {
        BackgroundClip::new(name, kind, MediaSource::Bytes(vec![1, 2, 3]))
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("beach.mp4", 1), "beach_export.mp4");
        assert_eq!(export_file_name("my.holiday.mov", 2), "my.holiday_export.mp4");
        assert_eq!(export_file_name("noext", 3), "noext_export.mp4");
        assert_eq!(export_file_name("", 4), "background_4_export.mp4");
        assert_eq!(export_file_name(".mp4", 5), "_export.mp4");
        assert_eq!(export_file_name("dir.v2/clip", 6), "dir.v2/clip_export.mp4");
    }

    #[test]
    fn test_video_filtering() {
        let demo = DemoClip::new("demo.mp4", MediaSource::Bytes(vec![9]));
        let request = ExportRequest::new(
            vec![
                clip("a.mp4", MediaKind::Video),
                clip("b.png", MediaKind::Image),
                clip("c.mov", MediaKind::Video),
            ],
            demo,
        );

        let names: Vec<_> = request.video_backgrounds().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a.mp4", "c.mov"]);
        assert_eq!(request.skipped_count(), 1);
    }

    #[test]
    fn test_effective_overlay() {
        let demo = DemoClip::new("demo.mp4", MediaSource::Bytes(vec![9]));
        let request = ExportRequest::new(vec![], demo.clone());
        assert!(request.effective_overlay().is_none());

        let request = request
            .with_overlay(TextOverlayConfig::new("", TextPosition::Top, TextSize::Small));
        assert!(request.effective_overlay().is_none());

        let request = ExportRequest::new(vec![], demo)
            .with_overlay(TextOverlayConfig::new("Hi", TextPosition::Top, TextSize::Small));
        assert!(request.effective_overlay().is_some());
    }
}
