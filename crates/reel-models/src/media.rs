//! Background and demo media inputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque byte source for an uploaded media file.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MediaSource {
    /// Bytes already held in memory
    Bytes(Vec<u8>),
    /// A file on local disk, read on demand
    File(PathBuf),
}

impl MediaSource {
    /// Read the full contents of the source.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            MediaSource::Bytes(bytes) => Ok(bytes.clone()),
            MediaSource::File(path) => tokio::fs::read(path).await,
        }
    }
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            MediaSource::File(path) => write!(f, "File({})", path.display()),
        }
    }
}

/// Declared media kind of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
    Other,
}

impl MediaKind {
    /// Classify by MIME type (`video/*`, `image/*`).
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("video/") {
            MediaKind::Video
        } else if mime.starts_with("image/") {
            MediaKind::Image
        } else {
            MediaKind::Other
        }
    }

    /// Classify by file name extension.
    pub fn from_file_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("mp4" | "m4v" | "mov" | "webm" | "mkv" | "avi" | "mpeg" | "mpg" | "ogv") => {
                MediaKind::Video
            }
            Some("png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "avif" | "heic") => {
                MediaKind::Image
            }
            _ => MediaKind::Other,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Video)
    }
}

/// One uploaded background clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundClip {
    /// Original display name, including extension
    pub name: String,
    /// Declared media kind; only videos take part in an export
    pub kind: MediaKind,
    pub source: MediaSource,
}

impl BackgroundClip {
    pub fn new(name: impl Into<String>, kind: MediaKind, source: MediaSource) -> Self {
        Self {
            name: name.into(),
            kind,
            source,
        }
    }

    /// Build a clip from a file on disk, classifying it by extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let kind = MediaKind::from_file_name(&name);
        Self::new(name, kind, MediaSource::File(path))
    }
}

/// The single demo clip appended after every background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoClip {
    pub name: String,
    pub source: MediaSource,
}

impl DemoClip {
    pub fn new(name: impl Into<String>, source: MediaSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(name, MediaSource::File(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("audio/mpeg"), MediaKind::Other);
        assert_eq!(MediaKind::from_mime(" Video/QuickTime"), MediaKind::Video);
    }

    #[test]
    fn test_kind_from_file_name() {
        assert_eq!(MediaKind::from_file_name("beach.MP4"), MediaKind::Video);
        assert_eq!(MediaKind::from_file_name("sunset.jpeg"), MediaKind::Image);
        assert_eq!(MediaKind::from_file_name("notes"), MediaKind::Other);
    }

    #[test]
    fn test_debug_hides_payload() {
        let source = MediaSource::Bytes(vec![0u8; 4096]);
        assert_eq!(format!("{:?}", source), "Bytes(4096 bytes)");
    }

    #[tokio::test]
    async fn test_read_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        tokio::fs::write(&path, b"frames").await.unwrap();

        let clip = BackgroundClip::from_path(&path);
        assert_eq!(clip.name, "clip.mp4");
        assert!(clip.kind.is_video());
        assert_eq!(clip.source.read().await.unwrap(), b"frames");
    }

    #[tokio::test]
    async fn test_read_missing_file_fails() {
        let source = MediaSource::File(PathBuf::from("/nonexistent/clip.mp4"));
        assert!(source.read().await.is_err());
    }
}
