//! Music catalog and selection.

use serde::{Deserialize, Serialize};

use crate::media::MediaSource;

/// Container format of every catalog track, and of uploads without an extension.
pub const DEFAULT_AUDIO_EXTENSION: &str = "mp3";

/// A predefined track hosted remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicTrack {
    pub id: String,
    pub file_name: String,
    pub url: String,
    pub display_name: String,
    /// Display duration (m:ss)
    pub duration: String,
}

impl MusicTrack {
    fn new(id: &str, url: &str, display_name: &str, duration: &str) -> Self {
        Self {
            id: id.to_string(),
            file_name: format!("{}.{}", id, DEFAULT_AUDIO_EXTENSION),
            url: url.to_string(),
            display_name: display_name.to_string(),
            duration: duration.to_string(),
        }
    }
}

/// Fixed table of predefined tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackCatalog {
    tracks: Vec<MusicTrack>,
}

impl Default for TrackCatalog {
    fn default() -> Self {
        Self::predefined()
    }
}

impl TrackCatalog {
    /// Build a catalog from an explicit track list.
    pub fn new(tracks: Vec<MusicTrack>) -> Self {
        Self { tracks }
    }

    /// The built-in catalog.
    pub fn predefined() -> Self {
        const BASE: &str = "https://hebbkx1anhila5yf.public.blob.vercel-storage.com";
        Self::new(vec![
            MusicTrack::new(
                "intergallactic_janet",
                &format!("{BASE}/intergallactic_janet-Y6LXYEWgV9z8aqxE8i79uVVjUV2DPZ.mp3"),
                "Intergalactic Janet",
                "3:24",
            ),
            MusicTrack::new(
                "daisies",
                &format!("{BASE}/daisies-R6Kd5aD3csZbxX28zHxrBdwdVdpNSu.mp3"),
                "Daisies",
                "2:47",
            ),
            MusicTrack::new(
                "letdown",
                &format!("{BASE}/letdown-6pMehsrxesdu89DaNlq0Vo7CCZDLoz.mp3"),
                "Letdown",
                "4:12",
            ),
            MusicTrack::new(
                "punkrocker",
                &format!("{BASE}/punkrocker-1S443dzUTXjMzkf8TDOtvBsQGMgaiH.mp3"),
                "Punk Rocker",
                "3:08",
            ),
        ])
    }

    /// Look up a track by id.
    pub fn get(&self, id: &str) -> Option<&MusicTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Resolve a track id to its remote URL.
    pub fn url_for(&self, id: &str) -> Option<&str> {
        self.get(id).map(|t| t.url.as_str())
    }

    pub fn tracks(&self) -> &[MusicTrack] {
        &self.tracks
    }

    /// Returns a copy of the catalog with one track's URL replaced.
    pub fn with_url(mut self, id: &str, url: impl Into<String>) -> Self {
        if let Some(track) = self.tracks.iter_mut().find(|t| t.id == id) {
            track.url = url.into();
        }
        self
    }
}

/// A user-uploaded audio file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioUpload {
    pub name: String,
    pub source: MediaSource,
}

impl AudioUpload {
    pub fn new(name: impl Into<String>, source: MediaSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// Extension after the last `.` of the name, or the default container.
    pub fn extension(&self) -> String {
        match self.name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() && !ext.contains('/') => ext.to_ascii_lowercase(),
            _ => DEFAULT_AUDIO_EXTENSION.to_string(),
        }
    }
}

/// Which audio track, if any, is looped under the exported video.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MusicSelection {
    /// Silent output
    #[default]
    None,
    /// A track from the predefined catalog
    Catalog { id: String },
    /// A user-uploaded audio file
    Uploaded(AudioUpload),
}

impl MusicSelection {
    pub fn catalog(id: impl Into<String>) -> Self {
        MusicSelection::Catalog { id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_catalog() {
        let catalog = TrackCatalog::predefined();
        assert_eq!(catalog.tracks().len(), 4);

        let daisies = catalog.get("daisies").unwrap();
        assert_eq!(daisies.display_name, "Daisies");
        assert_eq!(daisies.file_name, "daisies.mp3");
        assert!(catalog.url_for("daisies").unwrap().ends_with(".mp3"));
        assert!(catalog.url_for("unknown").is_none());
    }

    #[test]
    fn test_with_url_override() {
        let catalog = TrackCatalog::predefined().with_url("letdown", "http://localhost/letdown.mp3");
        assert_eq!(catalog.url_for("letdown"), Some("http://localhost/letdown.mp3"));
    }

    #[test]
    fn test_upload_extension() {
        let upload = |name: &str| AudioUpload::new(name, MediaSource::Bytes(Vec::new()));
        assert_eq!(upload("song.WAV").extension(), "wav");
        assert_eq!(upload("mix.final.m4a").extension(), "m4a");
        assert_eq!(upload("untitled").extension(), "mp3");
        assert_eq!(upload("trailing.").extension(), "mp3");
    }

    #[test]
    fn test_selection_serde() {
        let selection: MusicSelection =
            serde_json::from_str(r#"{"kind":"catalog","id":"daisies"}"#).unwrap();
        assert!(matches!(selection, MusicSelection::Catalog { ref id } if id == "daisies"));
        assert!(matches!(MusicSelection::default(), MusicSelection::None));
    }
}
