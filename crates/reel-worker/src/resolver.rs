//! Music resolution.
//!
//! Turns a [`MusicSelection`] into audio bytes plus the container extension
//! used to name the working file.

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use reel_media::music_file_name;
use reel_models::{MusicSelection, TrackCatalog, DEFAULT_AUDIO_EXTENSION};

use crate::error::{ExportError, ExportResult};

/// Audio ready to be staged for encoding.
#[derive(Clone)]
pub struct ResolvedAudio {
    pub bytes: Vec<u8>,
    pub extension: String,
}

impl std::fmt::Debug for ResolvedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedAudio")
            .field("bytes", &self.bytes.len())
            .field("extension", &self.extension)
            .finish()
    }
}

impl ResolvedAudio {
    /// Working file name for this audio.
    pub fn file_name(&self) -> String {
        music_file_name(&self.extension)
    }
}

/// Resolves music selections against the track catalog.
#[derive(Debug, Clone)]
pub struct MediaResolver {
    http: Client,
    catalog: TrackCatalog,
}

impl MediaResolver {
    /// Create a resolver with its own HTTP client.
    pub fn new(catalog: TrackCatalog, fetch_timeout: Duration) -> ExportResult<Self> {
        let http = Client::builder()
            .timeout(fetch_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("reel-worker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExportError::resolution(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(http, catalog))
    }

    /// Create a resolver sharing an existing HTTP client.
    pub fn with_client(http: Client, catalog: TrackCatalog) -> Self {
        Self { http, catalog }
    }

    pub fn catalog(&self) -> &TrackCatalog {
        &self.catalog
    }

    /// Resolve a selection. `None` means the export is silent.
    pub async fn resolve(&self, selection: &MusicSelection) -> ExportResult<Option<ResolvedAudio>> {
        match selection {
            MusicSelection::None => Ok(None),
            MusicSelection::Catalog { id } => {
                let url = self
                    .catalog
                    .url_for(id)
                    .ok_or_else(|| ExportError::resolution(format!("unknown track: {}", id)))?;

                let bytes = self.fetch(url).await?;
                info!(track = %id, bytes = bytes.len(), "Fetched catalog track");

                Ok(Some(ResolvedAudio {
                    bytes,
                    extension: DEFAULT_AUDIO_EXTENSION.to_string(),
                }))
            }
            MusicSelection::Uploaded(upload) => {
                let bytes = upload.source.read().await.map_err(|e| {
                    ExportError::resolution(format!("failed to read {}: {}", upload.name, e))
                })?;

                let extension = upload.extension();
                let extension = if extension.chars().all(|c| c.is_ascii_alphanumeric()) {
                    extension
                } else {
                    DEFAULT_AUDIO_EXTENSION.to_string()
                };

                debug!(file = %upload.name, bytes = bytes.len(), %extension, "Read uploaded audio");
                Ok(Some(ResolvedAudio { bytes, extension }))
            }
        }
    }

    async fn fetch(&self, url: &str) -> ExportResult<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ExportError::resolution(format!("fetch {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::resolution(format!(
                "fetch {} failed: HTTP {}",
                url,
                status.as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExportError::resolution(format!("read {} failed: {}", url, e)))?;

        Ok(bytes.to_vec())
    }
}
