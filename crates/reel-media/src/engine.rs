//! Encoding engine and its working storage.
//!
//! Jobs talk to the encoder through [`EncodeEngine`]: stage named files, run
//! an argument list, read the output back. [`FfmpegEngine`] backs this with
//! the `ffmpeg` CLI and a private temporary directory. The engine is
//! initialized once and reused by every job of every run.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;
use crate::progress::ProgressCallback;

/// Encoder with named working storage.
#[async_trait]
pub trait EncodeEngine: Send + Sync {
    /// Initialize the engine if it is not initialized yet. Idempotent.
    async fn ensure_ready(&self) -> MediaResult<()>;

    /// Stage a working file. The buffer is consumed.
    async fn write_file(&self, name: &str, data: Vec<u8>) -> MediaResult<()>;

    /// Read a working file.
    async fn read_file(&self, name: &str) -> MediaResult<Vec<u8>>;

    /// Remove a working file. Fails with [`MediaError::WorkingFileMissing`] if absent.
    async fn delete_file(&self, name: &str) -> MediaResult<()>;

    /// Duration of a staged media file in seconds.
    async fn probe_duration(&self, name: &str) -> MediaResult<f64>;

    /// Run the encoder with the given arguments, reporting progress ticks.
    async fn exec(&self, args: &[String], on_progress: ProgressCallback) -> MediaResult<()>;
}

/// FFmpeg engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// FFmpeg executable name or path
    pub ffmpeg_binary: String,
    /// FFprobe executable name or path
    pub ffprobe_binary: String,
    /// Parent directory for the working directory (system temp if unset)
    pub work_parent: Option<PathBuf>,
    /// Per-invocation encode timeout
    pub timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_binary: "ffmpeg".to_string(),
            ffprobe_binary: "ffprobe".to_string(),
            work_parent: None,
            timeout_secs: None,
        }
    }
}

#[derive(Debug)]
struct EngineState {
    work_dir: TempDir,
    ffmpeg: PathBuf,
    ffprobe: Option<PathBuf>,
}

/// [`EncodeEngine`] backed by the FFmpeg CLI.
#[derive(Debug)]
pub struct FfmpegEngine {
    config: EngineConfig,
    state: OnceCell<EngineState>,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl FfmpegEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Working directory, once initialized.
    pub fn work_dir(&self) -> Option<&Path> {
        self.state.get().map(|s| s.work_dir.path())
    }

    async fn init(&self) -> MediaResult<EngineState> {
        let ffmpeg = check_ffmpeg(&self.config.ffmpeg_binary)?;

        // Progress fractions need probing; encoding still works without it
        let ffprobe = match check_ffprobe(&self.config.ffprobe_binary) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "FFprobe unavailable, job progress will not be fractional");
                None
            }
        };

        let work_dir = match &self.config.work_parent {
            Some(parent) => {
                tokio::fs::create_dir_all(parent).await?;
                tempfile::Builder::new().prefix("reel-").tempdir_in(parent)?
            }
            None => tempfile::Builder::new().prefix("reel-").tempdir()?,
        };

        info!(
            ffmpeg = %ffmpeg.display(),
            work_dir = %work_dir.path().display(),
            "Encoding engine ready"
        );

        Ok(EngineState {
            work_dir,
            ffmpeg,
            ffprobe,
        })
    }

    fn state(&self) -> MediaResult<&EngineState> {
        self.state.get().ok_or(MediaError::EngineNotReady)
    }

    /// Resolve a working file name inside the working directory.
    fn path_for(&self, name: &str) -> MediaResult<PathBuf> {
        validate_name(name)?;
        Ok(self.state()?.work_dir.path().join(name))
    }
}

fn validate_name(name: &str) -> MediaResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(MediaError::InvalidWorkingFileName(name.to_string()));
    }
    Ok(())
}

fn missing_as(name: &str, err: std::io::Error) -> MediaError {
    if err.kind() == ErrorKind::NotFound {
        MediaError::WorkingFileMissing(name.to_string())
    } else {
        MediaError::Io(err)
    }
}

#[async_trait]
impl EncodeEngine for FfmpegEngine {
    async fn ensure_ready(&self) -> MediaResult<()> {
        self.state.get_or_try_init(|| self.init()).await?;
        Ok(())
    }

    async fn write_file(&self, name: &str, data: Vec<u8>) -> MediaResult<()> {
        let path = self.path_for(name)?;
        debug!(file = name, bytes = data.len(), "Staging working file");
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn read_file(&self, name: &str) -> MediaResult<Vec<u8>> {
        let path = self.path_for(name)?;
        tokio::fs::read(&path).await.map_err(|e| missing_as(name, e))
    }

    async fn delete_file(&self, name: &str) -> MediaResult<()> {
        let path = self.path_for(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| missing_as(name, e))
    }

    async fn probe_duration(&self, name: &str) -> MediaResult<f64> {
        let path = self.path_for(name)?;
        let ffprobe = self
            .state()?
            .ffprobe
            .as_ref()
            .ok_or_else(|| MediaError::FfprobeNotFound(self.config.ffprobe_binary.clone()))?;

        Ok(probe_media(ffprobe, &path).await?.duration)
    }

    async fn exec(&self, args: &[String], on_progress: ProgressCallback) -> MediaResult<()> {
        let state = self.state()?;

        let mut runner = FfmpegRunner::new()
            .with_binary(&state.ffmpeg)
            .with_current_dir(state.work_dir.path());
        if let Some(secs) = self.config.timeout_secs {
            runner = runner.with_timeout(secs);
        }

        runner.run_args(args, on_progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Engine that resolves its "ffmpeg" to the test binary, so storage can
    /// be exercised on machines without FFmpeg.
    fn storage_engine(parent: &Path) -> FfmpegEngine {
        let exe = std::env::current_exe().unwrap();
        FfmpegEngine::new(EngineConfig {
            ffmpeg_binary: exe.to_string_lossy().to_string(),
            ffprobe_binary: "reel-missing-ffprobe".to_string(),
            work_parent: Some(parent.to_path_buf()),
            timeout_secs: None,
        })
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("bg.mp4").is_ok());
        assert!(validate_name("music.mp3").is_ok());
        for bad in ["", ".", "..", "../etc/passwd", "a/b", "a\\b"] {
            assert!(matches!(
                validate_name(bad),
                Err(MediaError::InvalidWorkingFileName(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_missing_ffmpeg() {
        let engine = FfmpegEngine::new(EngineConfig {
            ffmpeg_binary: "reel-missing-ffmpeg".to_string(),
            ..Default::default()
        });

        let err = engine.ensure_ready().await.unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound(_)));
        assert!(engine.work_dir().is_none());
    }

    #[tokio::test]
    async fn test_not_ready() {
        let engine = FfmpegEngine::default();
        let err = engine.write_file("bg.mp4", vec![1]).await.unwrap_err();
        assert!(matches!(err, MediaError::EngineNotReady));
    }

    #[tokio::test]
    async fn test_working_storage() {
        let parent = tempfile::tempdir().unwrap();
        let engine = storage_engine(parent.path());

        engine.ensure_ready().await.unwrap();
        let dir = engine.work_dir().unwrap().to_path_buf();
        assert!(dir.starts_with(parent.path()));

        // Initialization happens once
        engine.ensure_ready().await.unwrap();
        assert_eq!(engine.work_dir().unwrap(), dir);

        engine.write_file("overlay.png", vec![1, 2, 3]).await.unwrap();
        assert_eq!(engine.read_file("overlay.png").await.unwrap(), vec![1, 2, 3]);

        engine.write_file("overlay.png", vec![4]).await.unwrap();
        assert_eq!(engine.read_file("overlay.png").await.unwrap(), vec![4]);

        engine.delete_file("overlay.png").await.unwrap();
        assert!(matches!(
            engine.delete_file("overlay.png").await,
            Err(MediaError::WorkingFileMissing(_))
        ));
        assert!(matches!(
            engine.read_file("out.mp4").await,
            Err(MediaError::WorkingFileMissing(_))
        ));
        assert!(matches!(
            engine.write_file("../escape.mp4", vec![0]).await,
            Err(MediaError::InvalidWorkingFileName(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_without_ffprobe() {
        let parent = tempfile::tempdir().unwrap();
        let engine = storage_engine(parent.path());
        engine.ensure_ready().await.unwrap();
        engine.write_file("bg.mp4", vec![0]).await.unwrap();

        assert!(matches!(
            engine.probe_duration("bg.mp4").await,
            Err(MediaError::FfprobeNotFound(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg and ffprobe on PATH"]
    async fn test_concat_duration() {
        use crate::filters::{FilterGraph, BACKGROUND_FILE, DEMO_FILE, OUTPUT_FILE};
        use reel_models::{EncodingConfig, TextPosition};

        let engine = FfmpegEngine::default();
        engine.ensure_ready().await.unwrap();

        let make = |secs: u32, size: &str, file: &str| -> Vec<String> {
            [
                "-y",
                "-v",
                "error",
                "-f",
                "lavfi",
                "-i",
                &format!("testsrc=duration={}:size={}:rate=25", secs, size),
                "-pix_fmt",
                "yuv420p",
                file,
            ]
            .iter()
            .map(|s| s.to_string())
            .collect()
        };
        engine.exec(&make(2, "640x360", BACKGROUND_FILE), Box::new(|_| {})).await.unwrap();
        engine.exec(&make(1, "720x1280", DEMO_FILE), Box::new(|_| {})).await.unwrap();

        let args = FilterGraph::build(None, None, TextPosition::Middle).to_args(&EncodingConfig::default());
        engine.exec(&args, Box::new(|_| {})).await.unwrap();

        let duration = engine.probe_duration(OUTPUT_FILE).await.unwrap();
        assert!((duration - 3.0).abs() <= 1.0 / 30.0 + 1e-6, "duration {duration}");
    }
}
