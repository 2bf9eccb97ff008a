//! FFmpeg/FFprobe command builders and result checks.
//!
//! Everything here produces [`ToolInvocation`]s or interprets
//! [`ToolOutput`]s; nothing spawns a process directly. The pipeline hands
//! the invocations to a [`ToolRunner`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::subprocess::{ToolError, ToolInvocation, ToolOutput, ToolRunner, DEFAULT_TOOL_TIMEOUT};

/// Default output frame rate for every clip and the final video.
pub const DEFAULT_FRAME_RATE: u32 = 15;

pub const FFMPEG_BIN: &str = "ffmpeg";
pub const FFPROBE_BIN: &str = "ffprobe";

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code}): {stderr}")]
    ExecutionFailed { exit_code: i32, stderr: String },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("invalid media duration: {0}")]
    InvalidDuration(f64),

    #[error("expected output file was not produced: {0}")]
    OutputMissing(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Slow centred push-in applied to every still image.
///
/// The image is fitted and cropped to the output canvas, upscaled to
/// `upscale_width` (so the zoom stays smooth instead of stepping between
/// integer pixels), then `zoompan` grows the zoom by `zoom_step` per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomPanEffect {
    pub width: u32,
    pub height: u32,
    pub upscale_width: u32,
    pub zoom_step: f64,
}

impl Default for ZoomPanEffect {
    fn default() -> Self {
        Self {
            width: 1344,
            height: 768,
            upscale_width: 8000,
            zoom_step: 0.0005,
        }
    }
}

/// Encoder parameters shared by every segment clip and the final concat.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub frame_rate: u32,
    pub effect: ZoomPanEffect,
    pub pixel_format: String,
    pub video_codec: String,
    pub audio_codec: String,
    /// Per-invocation wall-clock limit.
    pub timeout: Duration,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            effect: ZoomPanEffect::default(),
            pixel_format: "yuv420p".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

impl EncodeSettings {
    /// Length of one frame in seconds.
    pub fn frame_interval_secs(&self) -> f64 {
        1.0 / f64::from(self.frame_rate.max(1))
    }
}

// ---------------------------------------------------------------------------
// Filter and argument builders
// ---------------------------------------------------------------------------

/// Number of frames needed to cover `duration_secs` at `frame_rate`.
///
/// Rounds up so the picture never ends before the narration; the encoder
/// clips the tail with `-t`. Always at least one frame.
pub fn frame_count(duration_secs: f64, frame_rate: u32) -> u32 {
    let frames = (duration_secs * f64::from(frame_rate)).ceil();
    if frames.is_finite() && frames >= 1.0 {
        frames as u32
    } else {
        1
    }
}

/// Build the `-filter_complex` graph for one still image.
///
/// Input is stream `0:v` (the piped image); output is labelled `[v]`.
pub fn zoompan_filter(effect: &ZoomPanEffect, frames: u32, frame_rate: u32) -> String {
    let ZoomPanEffect {
        width: w,
        height: h,
        upscale_width,
        zoom_step,
    } = effect;
    format!(
        "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,setsar=1:1,crop={w}:{h},\
         scale={upscale_width}:-1,\
         zoompan=z='zoom+{zoom_step}':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':\
         d={frames}:s={w}x{h}:fps={frame_rate}[v]"
    )
}

/// Single-pass encode of one segment: image bytes on stdin, narration as
/// the second input, pan/zoom applied, output clipped to the narration.
pub fn encode_segment_invocation(
    settings: &EncodeSettings,
    image: Vec<u8>,
    audio_path: &Path,
    duration_secs: f64,
    output_path: &Path,
) -> ToolInvocation {
    let frames = frame_count(duration_secs, settings.frame_rate);
    let filter = zoompan_filter(&settings.effect, frames, settings.frame_rate);

    ToolInvocation::new(FFMPEG_BIN)
        .args(["-y", "-hide_banner", "-loglevel", "error"])
        .args(["-f", "image2pipe", "-i", "pipe:0"])
        .arg("-i")
        .arg(audio_path.to_string_lossy())
        .arg("-filter_complex")
        .arg(filter)
        .args(["-map", "[v]", "-map", "1:a"])
        .args(["-c:v", settings.video_codec.as_str()])
        .args(["-pix_fmt", settings.pixel_format.as_str()])
        .arg("-r")
        .arg(settings.frame_rate.to_string())
        .args(["-c:a", settings.audio_codec.as_str()])
        .arg("-t")
        .arg(format!("{duration_secs:.3}"))
        .arg(output_path.to_string_lossy())
        .stdin(image)
        .timeout(settings.timeout)
}

/// Concat-demuxer pass over a manifest, re-encoded at a constant frame rate
/// so audio and video don't drift across clip boundaries.
pub fn concat_invocation(
    settings: &EncodeSettings,
    manifest_path: &Path,
    output_path: &Path,
) -> ToolInvocation {
    ToolInvocation::new(FFMPEG_BIN)
        .args(["-y", "-hide_banner", "-loglevel", "error"])
        .args(["-f", "concat", "-safe", "0", "-i"])
        .arg(manifest_path.to_string_lossy())
        .args(["-c:v", settings.video_codec.as_str()])
        .args(["-pix_fmt", settings.pixel_format.as_str()])
        .args(["-fps_mode", "cfr"])
        .arg("-r")
        .arg(settings.frame_rate.to_string())
        .args(["-c:a", settings.audio_codec.as_str()])
        .arg(output_path.to_string_lossy())
        .timeout(settings.timeout)
}

/// Render a concat-demuxer manifest, one `file '<path>'` line per clip,
/// in the order given.
pub fn render_manifest<P: AsRef<Path>>(clips: &[P]) -> String {
    clips
        .iter()
        .map(|p| {
            let path = p.as_ref().to_string_lossy();
            format!("file '{}'\n", path.replace('\'', r"'\''"))
        })
        .collect()
}

/// Extract clip paths back out of a manifest (inverse of [`render_manifest`]).
pub fn parse_manifest(manifest: &str) -> Vec<String> {
    manifest
        .lines()
        .filter_map(|line| line.strip_prefix("file '")?.strip_suffix('\''))
        .map(|p| p.replace(r"'\''", "'"))
        .collect()
}

// ---------------------------------------------------------------------------
// Result checks
// ---------------------------------------------------------------------------

/// Turn a non-zero exit into [`FfmpegError::ExecutionFailed`].
pub fn check_exit(output: ToolOutput) -> Result<ToolOutput, FfmpegError> {
    if output.success() {
        Ok(output)
    } else {
        Err(FfmpegError::ExecutionFailed {
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

/// Parse the bare `format=duration` value printed by ffprobe.
///
/// The duration must be a finite, strictly positive number of seconds.
pub fn parse_probe_duration(stdout: &str) -> Result<f64, FfmpegError> {
    let raw = stdout.trim();
    let secs = raw
        .parse::<f64>()
        .map_err(|e| FfmpegError::ParseError(format!("{e}: '{raw}'")))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err(FfmpegError::InvalidDuration(secs))
    }
}

// ---------------------------------------------------------------------------
// Duration probe
// ---------------------------------------------------------------------------

/// Measures the playback length of an audio file.
#[async_trait::async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration_secs(&self, path: &Path) -> Result<f64, FfmpegError>;
}

/// [`DurationProbe`] that shells out to `ffprobe`.
pub struct FfprobeDurationProbe {
    runner: Arc<dyn ToolRunner>,
    timeout: Duration,
}

impl FfprobeDurationProbe {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            runner,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn probe_invocation(&self, path: &Path) -> ToolInvocation {
        ToolInvocation::new(FFPROBE_BIN)
            .args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(path.to_string_lossy())
            .timeout(self.timeout)
    }
}

#[async_trait::async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn duration_secs(&self, path: &Path) -> Result<f64, FfmpegError> {
        let output = self.runner.run(self.probe_invocation(path)).await?;
        let output = check_exit(output)?;
        parse_probe_duration(&output.stdout)
    }
}
