//! Batch reel export binary.
//!
//! Reference caller for the exporter: reads clips from disk, writes the
//! finished videos into an output directory and prints status events.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_media::{FfmpegEngine, OverlayRenderer};
use reel_models::{
    AudioUpload, BackgroundClip, DemoClip, ExportRequest, MediaSource, MusicSelection,
    TextOverlayConfig, TextPosition, TextSize, TrackCatalog,
};
use reel_worker::{DirectoryDelivery, ExportConfig, Exporter, MediaResolver};

#[derive(Parser, Debug)]
#[command(name = "reel-export", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export one video per background clip.
    Export(ExportArgs),
    /// List the predefined music tracks.
    Tracks,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Background clips, in output order. Non-video files are skipped.
    #[arg(long = "background", short = 'b', required = true, num_args = 1..)]
    backgrounds: Vec<PathBuf>,

    /// Demo clip appended after every background.
    #[arg(long)]
    demo: PathBuf,

    /// Overlay text. Empty means no overlay.
    #[arg(long, default_value = "")]
    text: String,

    /// Overlay position: top, middle or bottom.
    #[arg(long, default_value_t = TextPosition::Middle)]
    position: TextPosition,

    /// Overlay size: small, medium, large or extra-large.
    #[arg(long, default_value_t = TextSize::Medium)]
    size: TextSize,

    /// Predefined track id to loop under the video.
    #[arg(long, conflicts_with = "music")]
    track: Option<String>,

    /// Audio file to loop under the video.
    #[arg(long)]
    music: Option<PathBuf>,

    /// Output directory (defaults to REEL_OUTPUT_DIR or ./exports).
    #[arg(long, short = 'o')]
    out_dir: Option<PathBuf>,

    /// Print the final report as JSON instead of the delivered paths.
    #[arg(long)]
    json: bool,
}

impl ExportArgs {
    fn into_request(self) -> ExportRequest {
        let backgrounds = self
            .backgrounds
            .into_iter()
            .map(BackgroundClip::from_path)
            .collect();

        let music = match (self.track, self.music) {
            (Some(id), _) => MusicSelection::catalog(id),
            (None, Some(path)) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                MusicSelection::Uploaded(AudioUpload::new(name, MediaSource::File(path)))
            }
            (None, None) => MusicSelection::None,
        };

        ExportRequest::new(backgrounds, DemoClip::from_path(self.demo))
            .with_overlay(TextOverlayConfig::new(self.text, self.position, self.size))
            .with_music(music)
    }
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reel_worker=info,reel_media=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Tracks => {
            for track in TrackCatalog::predefined().tracks() {
                println!("{:<22} {:<24} {}", track.id, track.display_name, track.duration);
            }
            Ok(())
        }
        Command::Export(args) => run_export(args).await,
    }
}

async fn run_export(args: ExportArgs) -> anyhow::Result<()> {
    let mut config = ExportConfig::from_env();
    if let Some(dir) = &args.out_dir {
        config.output_dir = dir.clone();
    }
    info!("Export config: {:?}", config);

    let engine = Arc::new(FfmpegEngine::new(config.engine_config()));
    let resolver = MediaResolver::new(TrackCatalog::predefined(), config.fetch_timeout)
        .context("create media resolver")?;
    let renderer = Arc::new(OverlayRenderer::new());
    let sink = Arc::new(DirectoryDelivery::new(&config.output_dir));

    let exporter = Arc::new(
        Exporter::new(engine, resolver, renderer, sink)
            .with_encoding(config.encoding.clone())
            .with_event_capacity(config.event_capacity),
    );

    let json = args.json;
    let mut run = exporter.spawn(args.into_request())?;
    info!(run_id = %run.run_id, "Export started");

    let mut interrupted = false;
    loop {
        tokio::select! {
            event = run.next_event() => match event {
                Some(event) => println!("[{:>3}%] {}", event.percent, event.message),
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                info!("Received shutdown signal, stopping after the current job");
                interrupted = true;
                run.cancel();
            }
        }
    }

    match run.wait().await {
        Ok(report) => {
            info!(
                delivered = report.delivered.len(),
                skipped = report.skipped_inputs,
                fallback = report.fallback_jobs,
                "Export complete"
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for name in &report.delivered {
                    println!("{}", config.output_dir.join(name).display());
                }
            }
            Ok(())
        }
        Err(e) => {
            error!("Export failed: {}", e);
            Err(e.into())
        }
    }
}
