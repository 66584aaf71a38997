//! Delivery of finished exports.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{ExportError, ExportResult};

/// One finished video.
#[derive(Clone)]
pub struct Deliverable {
    /// 1-based job index
    pub job_index: u32,
    /// `<original-stem>_export.mp4`
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Deliverable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deliverable")
            .field("job_index", &self.job_index)
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Receives each finished video as soon as its job completes.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, deliverable: Deliverable) -> ExportResult<()>;
}

/// Writes deliverables into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryDelivery {
    dir: PathBuf,
}

impl DirectoryDelivery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Destination for a deliverable; only the final name component is used.
    fn target_path(&self, file_name: &str) -> ExportResult<PathBuf> {
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| ExportError::delivery(format!("invalid file name: {}", file_name)))?;
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl DeliverySink for DirectoryDelivery {
    async fn deliver(&self, deliverable: Deliverable) -> ExportResult<()> {
        let path = self.target_path(&deliverable.file_name)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let size = deliverable.bytes.len();
        tokio::fs::write(&path, deliverable.bytes)
            .await
            .map_err(|e| ExportError::delivery(format!("write {}: {}", path.display(), e)))?;

        info!(
            job_index = deliverable.job_index,
            file = %path.display(),
            bytes = size,
            "Delivered export"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_directory_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryDelivery::new(dir.path().join("out"));

        sink.deliver(Deliverable {
            job_index: 1,
            file_name: "beach_export.mp4".to_string(),
            bytes: vec![1, 2, 3],
        })
        .await
        .unwrap();

        let written = std::fs::read(dir.path().join("out/beach_export.mp4")).unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_nested_name_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryDelivery::new(dir.path());

        sink.deliver(Deliverable {
            job_index: 2,
            file_name: "../clips/city_export.mp4".to_string(),
            bytes: vec![9],
        })
        .await
        .unwrap();

        assert!(dir.path().join("city_export.mp4").exists());
    }

    #[test]
    fn test_invalid_name() {
        let sink = DirectoryDelivery::new("/tmp");
        assert!(matches!(
            sink.target_path(".."),
            Err(ExportError::Delivery(_))
        ));
    }
}
