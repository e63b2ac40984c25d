//! Application and pipeline configuration.
//!
//! Every knob the composition pipeline reads lives in [`PipelineConfig`];
//! nothing is taken from globals, so a run is reproducible from its config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{NewsreelError, NewsreelResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Composition pipeline settings.
    pub pipeline: PipelineConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Parameters for one composition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Output resolution (width x height in pixels). Both must be even.
    pub width: u32,
    pub height: u32,

    /// Constant output frame rate. Every clip is resampled to it.
    pub fps: u32,

    /// Pixel format of every normalized clip and of the final output.
    pub pixel_format: String,

    /// Color tagging applied to every encode, so concatenated clips never shift color.
    pub color: ColorSpec,

    /// How clips with a different aspect ratio are fitted to the output frame.
    pub scale_policy: ScalePolicy,

    /// How a clip sequence shorter than the narration is extended.
    pub fill_policy: FillPolicy,

    /// Video encoder and preset used for every re-encode.
    pub video_codec: String,
    pub video_preset: String,

    /// Audio encoder for the narration (`copy` keeps the source stream).
    pub audio_codec: String,

    /// Audio bitrate in kbps (ignored for `copy`).
    pub audio_bitrate_kbps: u32,

    /// Distance in pixels between the PIP box and the frame edges.
    pub pip_padding: u32,

    /// Allowed video/audio duration difference before a mismatch warning.
    /// `None` means one frame at `fps`.
    pub duration_tolerance_secs: Option<f64>,

    /// Visual duration when no narration track is supplied.
    pub default_duration_secs: f64,

    /// Scrolling text appearance.
    pub overlay: OverlayStyle,

    /// Upper bound for a single ffmpeg/ffprobe invocation.
    pub tool_timeout_secs: u64,

    /// Parallel clip normalizations (1 = sequential).
    pub normalize_workers: usize,

    /// Drop clips whose normalization fails instead of aborting the run.
    pub drop_failed_clips: bool,

    /// Keep the scratch directory when a run fails, for diagnosis.
    pub keep_intermediates_on_failure: bool,

    /// External binaries.
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

/// Color space, primaries, transfer function and range tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSpec {
    pub space: String,
    pub primaries: String,
    pub transfer: String,
    pub range: String,
}

/// Fitting policy for the clip normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalePolicy {
    /// Scale to fit inside the frame, pad the remainder with black bars.
    #[default]
    Letterbox,
    /// Scale both axes to the frame size, distorting the aspect ratio.
    Stretch,
}

/// How a sequence shorter than the target duration is extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Repeat the whole sequence from the start, in the original order.
    #[default]
    Loop,
    /// Freeze the last frame of the last clip for the remaining time.
    Hold,
}

/// Where the scrolling text starts its crawl.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPosition {
    /// Enters below the bottom edge and crawls upward.
    #[default]
    Bottom,
    /// Enters above the top edge and crawls downward.
    Top,
    /// First line starts at `y` pixels and crawls upward.
    Custom { y: u32 },
}

/// Scrolling text appearance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub position: OverlayPosition,
    pub font_size: u32,
    pub font_color: String,
    /// Font file passed to drawtext; fontconfig default when absent.
    pub font_file: Option<PathBuf>,
    pub line_spacing: u32,
    pub box_color: String,
    pub box_border: u32,
    /// Share of the frame width the wrapped text may occupy.
    pub text_width_ratio: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "newsreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            pixel_format: "yuv420p".to_string(),
            color: ColorSpec::default(),
            scale_policy: ScalePolicy::Letterbox,
            fill_policy: FillPolicy::Loop,
            video_codec: "libx264".to_string(),
            video_preset: "medium".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate_kbps: 192,
            pip_padding: 20,
            duration_tolerance_secs: None,
            default_duration_secs: 60.0,
            overlay: OverlayStyle::default(),
            tool_timeout_secs: 900,
            normalize_workers: 1,
            drop_failed_clips: true,
            keep_intermediates_on_failure: true,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

impl Default for ColorSpec {
    fn default() -> Self {
        Self {
            space: "bt709".to_string(),
            primaries: "bt709".to_string(),
            transfer: "bt709".to_string(),
            range: "tv".to_string(),
        }
    }
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            position: OverlayPosition::Bottom,
            font_size: 36,
            font_color: "white".to_string(),
            font_file: None,
            line_spacing: 10,
            box_color: "black@0.5".to_string(),
            box_border: 5,
            text_width_ratio: 0.7,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl ColorSpec {
    /// Encoder flags that tag the output stream with this color description.
    pub fn encoder_args(&self) -> Vec<String> {
        vec![
            "-colorspace".to_string(),
            self.space.clone(),
            "-color_primaries".to_string(),
            self.primaries.clone(),
            "-color_trc".to_string(),
            self.transfer.clone(),
            "-color_range".to_string(),
            self.range.clone(),
        ]
    }
}

impl PipelineConfig {
    /// Reject values that would make the external engine fail late or
    /// produce a broken file.
    pub fn validate(&self) -> NewsreelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(NewsreelError::config("output width/height must be non-zero"));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(NewsreelError::config(format!(
                "output size {}x{} must be even for {} output",
                self.width, self.height, self.pixel_format
            )));
        }
        if self.fps == 0 {
            return Err(NewsreelError::config("fps must be non-zero"));
        }
        if self.tool_timeout_secs == 0 {
            return Err(NewsreelError::config("tool_timeout_secs must be non-zero"));
        }
        if !(self.default_duration_secs > 0.0) {
            return Err(NewsreelError::config(
                "default_duration_secs must be positive",
            ));
        }
        if let Some(tolerance) = self.duration_tolerance_secs {
            if !(tolerance >= 0.0) {
                return Err(NewsreelError::config(
                    "duration_tolerance_secs must be non-negative",
                ));
            }
        }
        if self.overlay.font_size == 0 {
            return Err(NewsreelError::config("overlay font_size must be non-zero"));
        }
        if !(self.overlay.text_width_ratio > 0.0 && self.overlay.text_width_ratio <= 1.0) {
            return Err(NewsreelError::config(
                "overlay text_width_ratio must be in (0, 1]",
            ));
        }
        Ok(())
    }

    /// Effective duration tolerance: explicit value or one output frame.
    pub fn tolerance_secs(&self) -> f64 {
        self.duration_tolerance_secs
            .unwrap_or_else(|| crate::timing::frame_duration_secs(self.fps as f64))
    }

    /// Per-invocation timeout.
    pub fn tool_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tool_timeout_secs)
    }

    /// Worker count clamped to at least one.
    pub fn workers(&self) -> usize {
        self.normalize_workers.max(1)
    }
}

impl AppConfig {
    /// Load config from the standard location. A missing file yields the
    /// defaults; an unreadable or malformed one is an error, so callers that
    /// initialize logging from the config can report it afterwards.
    pub fn load_checked() -> NewsreelResult<Self> {
        let config_path = config_file_path();
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&config_path)
    }

    /// Load config from an explicit path. Unlike [`AppConfig::load_checked`],
    /// a missing file is an error.
    pub fn load_from(path: &Path) -> NewsreelResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            NewsreelError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            NewsreelError::config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.pipeline.validate()?;
        Ok(config)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("newsreel").join("config.json")
}
