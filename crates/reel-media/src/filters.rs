//! Composition filter graph.
//!
//! Every job uses the same shape of graph: background and demo are normalized
//! to the portrait target frame, concatenated, optionally overlaid with the
//! rendered text image and converted to the output pixel format. Music, when
//! present, is looped under the video and the output stops with the video.

use reel_models::{EncodingConfig, TextPosition, TARGET_FPS, TARGET_HEIGHT, TARGET_WIDTH};

use crate::command::{FfmpegCommand, InputSpec};

/// Working file holding the current background.
pub const BACKGROUND_FILE: &str = "bg.mp4";
/// Working file holding the demo clip.
pub const DEMO_FILE: &str = "demo.mp4";
/// Working file holding the rendered overlay.
pub const OVERLAY_FILE: &str = "overlay.png";
/// Working file the encoder writes.
pub const OUTPUT_FILE: &str = "out.mp4";

/// Working file name for music with the given container extension.
pub fn music_file_name(extension: &str) -> String {
    format!("music.{}", extension)
}

/// Scale down to fit, letterbox to the exact frame, square pixels, fixed rate.
fn normalize_video(input: usize) -> String {
    format!(
        "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}[v{i}]",
        i = input,
        w = TARGET_WIDTH,
        h = TARGET_HEIGHT,
        fps = TARGET_FPS,
    )
}

/// Filter graph and stream layout for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGraph {
    /// Inputs in FFmpeg index order
    pub inputs: Vec<InputSpec>,
    /// `-filter_complex` description
    pub filter_complex: String,
    /// Streams mapped into the output, video first
    pub mappings: Vec<String>,
    /// Whether an audio stream is mapped; output then ends with the video
    pub has_audio: bool,
}

impl FilterGraph {
    /// Build the graph for a job.
    ///
    /// `overlay_file` and `audio_file` are working file names; `None` means the
    /// job has no overlay or no music. Input order is background (0), demo (1),
    /// looped audio (2) when present, then the overlay image.
    pub fn build(overlay_file: Option<&str>, audio_file: Option<&str>, position: TextPosition) -> Self {
        let mut inputs = vec![InputSpec::new(BACKGROUND_FILE), InputSpec::new(DEMO_FILE)];

        let audio_index = audio_file.map(|file| {
            inputs.push(InputSpec::looped(file));
            inputs.len() - 1
        });

        let overlay_index = overlay_file.map(|file| {
            inputs.push(InputSpec::new(file));
            inputs.len() - 1
        });

        let mut graph = vec![
            normalize_video(0),
            normalize_video(1),
            "[v0][v1]concat=n=2:v=1:a=0[vcat]".to_string(),
        ];

        match overlay_index {
            Some(index) => graph.push(format!(
                "[vcat][{}:v]overlay=(main_w-overlay_w)/2:{}:format=auto,format=yuv420p[vout]",
                index,
                position.overlay_y_expr()
            )),
            None => graph.push("[vcat]format=yuv420p[vout]".to_string()),
        }

        let mut mappings = vec!["[vout]".to_string()];
        if let Some(index) = audio_index {
            mappings.push(format!("{}:a", index));
        }

        Self {
            inputs,
            filter_complex: graph.join(";"),
            mappings,
            has_audio: audio_index.is_some(),
        }
    }

    /// Full encode command writing [`OUTPUT_FILE`].
    pub fn to_command(&self, encoding: &EncodingConfig) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(OUTPUT_FILE)
            .inputs(self.inputs.iter().cloned())
            .filter_complex(&self.filter_complex);

        for stream in &self.mappings {
            cmd = cmd.map(stream);
        }
        if self.has_audio {
            cmd = cmd.shortest();
        }

        cmd = cmd.output_args(encoding.video_args());
        if self.has_audio {
            cmd = cmd.output_args(encoding.audio_args());
        }

        cmd
    }

    /// Encode arguments for the given configuration.
    pub fn to_args(&self, encoding: &EncodingConfig) -> Vec<String> {
        self.to_command(encoding).build_args()
    }
}
