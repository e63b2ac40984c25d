//! Boundary to the external media engine.
//!
//! Every pixel operation is an [`Invocation`] handed to a [`MediaEngine`].
//! The production engine shells out to ffmpeg/ffprobe; [`crate::fake`]
//! provides a recording engine for tests.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use newsreel_common::config::PipelineConfig;
use newsreel_common::error::{NewsreelError, NewsreelResult};
use serde::{Deserialize, Serialize};

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Maximum stderr bytes carried into an error.
const STDERR_TAIL_BYTES: usize = 4096;

/// Arguments every ffmpeg invocation starts with.
const FFMPEG_PREAMBLE: [&str; 4] = ["-y", "-hide_banner", "-loglevel", "error"];

/// Pipeline step an invocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Probe,
    Normalize,
    Assemble,
    Overlay,
    Mux,
    PipResize,
    PipOverlay,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Probe => "probe",
            Stage::Normalize => "normalize",
            Stage::Assemble => "assemble",
            Stage::Overlay => "overlay",
            Stage::Mux => "mux",
            Stage::PipResize => "pip-resize",
            Stage::PipOverlay => "pip-overlay",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ffmpeg run: inputs, stage-specific arguments and the output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub stage: Stage,
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    /// Arguments between the common preamble and the output path.
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(stage: Stage, output: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            inputs: Vec::new(),
            output: output.into(),
            args: Vec::new(),
        }
    }

    /// Add `-i <path>`.
    pub fn input(self, path: &Path) -> Self {
        self.input_with(&[], path)
    }

    /// Add `<options> -i <path>`, for per-input options such as `-stream_loop`.
    pub fn input_with(mut self, options: &[&str], path: &Path) -> Self {
        self.args.extend(options.iter().map(|o| o.to_string()));
        self.args.push("-i".to_string());
        self.args.push(path.to_string_lossy().into_owned());
        self.inputs.push(path.to_path_buf());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Value following the first occurrence of `flag`.
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Full ffmpeg argument list.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        FFMPEG_PREAMBLE
            .iter()
            .map(|s| s.to_string())
            .chain(self.args.iter().cloned())
            .chain(std::iter::once(self.output.to_string_lossy().into_owned()))
            .collect()
    }
}

/// Subset of `ffprobe -print_format json -show_streams -show_format`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub r_frame_rate: Option<String>,
    #[serde(default)]
    pub avg_frame_rate: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeFormat {
    #[serde(default)]
    pub format_name: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
}

impl ProbeReport {
    /// A single-video-stream report, as ffprobe prints it.
    pub fn video(width: u32, height: u32, duration_secs: f64, fps: f64) -> Self {
        let rate = format!("{}/1000", (fps * 1000.0).round() as u64);
        Self {
            streams: vec![ProbeStream {
                codec_type: Some("video".to_string()),
                width: Some(width),
                height: Some(height),
                r_frame_rate: Some(rate.clone()),
                avg_frame_rate: Some(rate),
                duration: Some(format!("{duration_secs:.6}")),
            }],
            format: Some(ProbeFormat {
                format_name: Some("mov,mp4,m4a,3gp,3g2,mj2".to_string()),
                duration: Some(format!("{duration_secs:.6}")),
            }),
        }
    }

    /// A single-audio-stream report.
    pub fn audio(duration_secs: f64) -> Self {
        Self {
            streams: vec![ProbeStream {
                codec_type: Some("audio".to_string()),
                duration: Some(format!("{duration_secs:.6}")),
                ..ProbeStream::default()
            }],
            format: Some(ProbeFormat {
                format_name: Some("mp3".to_string()),
                duration: Some(format!("{duration_secs:.6}")),
            }),
        }
    }

    pub fn video_stream(&self) -> Option<&ProbeStream> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
    }

    pub fn has_audio(&self) -> bool {
        self.streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"))
    }

    /// Container duration in seconds.
    pub fn format_duration(&self) -> Option<f64> {
        self.format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(parse_duration)
    }
}

impl ProbeStream {
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration.as_deref().and_then(parse_duration)
    }
}

/// Parses an ffprobe duration field. `N/A` and non-positive values are absent.
fn parse_duration(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Low-level failure of an engine run, before it is tied to a stage.
#[derive(Debug, thiserror::Error)]
pub enum EngineFailure {
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[error("failed to wait on {binary}: {source}")]
    Wait {
        binary: String,
        source: std::io::Error,
    },

    #[error("exited with status {status}: {stderr}")]
    Exited { status: String, stderr: String },

    #[error("timed out after {:.1}s", .timeout.as_secs_f64())]
    TimedOut { timeout: Duration },

    #[error("unparseable output: {message}")]
    Parse { message: String },
}

impl EngineFailure {
    /// Exit status label, or a short description for failures without one.
    fn status_label(&self) -> String {
        match self {
            EngineFailure::Exited { status, .. } => status.clone(),
            EngineFailure::Spawn { .. } => "not started".to_string(),
            EngineFailure::Wait { .. } => "unknown".to_string(),
            EngineFailure::TimedOut { .. } => "killed".to_string(),
            EngineFailure::Parse { .. } => "0".to_string(),
        }
    }

    fn detail(&self) -> String {
        match self {
            EngineFailure::Exited { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }

    /// Attach the failing stage and its input files.
    pub fn into_error(self, stage: Stage, inputs: &[PathBuf]) -> NewsreelError {
        if let EngineFailure::TimedOut { timeout } = self {
            return NewsreelError::ExternalToolTimeout {
                stage: stage.to_string(),
                timeout_secs: timeout.as_secs_f64(),
                inputs: inputs.to_vec(),
            };
        }

        let status = self.status_label();
        let stderr = self.detail();
        match stage {
            Stage::Probe => NewsreelError::MediaUnreadable {
                path: inputs.first().cloned().unwrap_or_default(),
                reason: format!("probe failed (status {status}): {stderr}"),
            },
            Stage::Normalize => NewsreelError::NormalizationFailed {
                clip: inputs.first().cloned().unwrap_or_default(),
                status,
                stderr,
            },
            Stage::PipResize | Stage::PipOverlay => NewsreelError::PipCompositionFailed {
                step: stage.to_string(),
                inputs: inputs.to_vec(),
                status,
                stderr,
            },
            Stage::Assemble | Stage::Overlay | Stage::Mux => NewsreelError::StageFailed {
                stage: stage.to_string(),
                inputs: inputs.to_vec(),
                status,
                stderr,
            },
        }
    }
}

/// Trait for media engines (ffmpeg, test doubles).
pub trait MediaEngine: Send + Sync {
    /// Describe the streams and container of `path`.
    fn probe(&self, path: &Path) -> Result<ProbeReport, EngineFailure>;

    /// Run one invocation to completion, producing `invocation.output`.
    fn execute(&self, invocation: &Invocation) -> Result<(), EngineFailure>;

    /// Engine name.
    fn name(&self) -> &str;

    /// Check if the engine can run on this system.
    fn is_available(&self) -> bool;
}

/// Execute `invocation`, logging it and mapping failures to the stage's error.
pub fn run_invocation(engine: &dyn MediaEngine, invocation: &Invocation) -> NewsreelResult<()> {
    tracing::debug!(
        stage = %invocation.stage,
        engine = engine.name(),
        args = ?invocation.ffmpeg_args(),
        "Running engine invocation"
    );

    let started = Instant::now();
    engine.execute(invocation).map_err(|failure| {
        tracing::error!(
            stage = %invocation.stage,
            error = %failure,
            "Engine invocation failed"
        );
        failure.into_error(invocation.stage, &invocation.inputs)
    })?;

    tracing::debug!(
        stage = %invocation.stage,
        elapsed_ms = started.elapsed().as_millis(),
        output = %invocation.output.display(),
        "Engine invocation finished"
    );
    Ok(())
}

/// ffmpeg/ffprobe run as child processes under a wall-clock timeout.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_bin: String,
    ffprobe_bin: String,
    timeout: Duration,
}

struct ToolOutput {
    stdout: Vec<u8>,
}

impl FfmpegEngine {
    pub fn new(ffmpeg_bin: impl Into<String>, ffprobe_bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
            timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.ffmpeg_bin.clone(),
            config.ffprobe_bin.clone(),
            config.tool_timeout(),
        )
    }

    pub fn ffmpeg_bin(&self) -> &str {
        &self.ffmpeg_bin
    }

    pub fn ffprobe_bin(&self) -> &str {
        &self.ffprobe_bin
    }

    fn run_with_timeout(&self, mut cmd: Command) -> Result<ToolOutput, EngineFailure> {
        let binary = cmd.get_program().to_string_lossy().into_owned();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| EngineFailure::Spawn {
            binary: binary.clone(),
            source,
        })?;
        tracing::trace!(pid = child.id(), binary = %binary, "Child process started");

        // Both pipes are drained concurrently so the child never blocks on a full pipe.
        let stdout_task = child.stdout.take().map(drain);
        let stderr_task = child.stderr.take().map(drain);

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    join(stdout_task);
                    join(stderr_task);
                    tracing::warn!(
                        binary = %binary,
                        timeout_secs = self.timeout.as_secs_f64(),
                        "Killed child process after timeout"
                    );
                    return Err(EngineFailure::TimedOut {
                        timeout: self.timeout,
                    });
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    let _ = child.kill();
                    return Err(EngineFailure::Wait { binary, source });
                }
            }
        };

        let stdout = join(stdout_task);
        let stderr = join(stderr_task);

        if !status.success() {
            return Err(EngineFailure::Exited {
                status: status_label(status),
                stderr: stderr_tail(&stderr),
            });
        }

        Ok(ToolOutput { stdout })
    }
}

impl MediaEngine for FfmpegEngine {
    fn probe(&self, path: &Path) -> Result<ProbeReport, EngineFailure> {
        let mut cmd = Command::new(&self.ffprobe_bin);
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path);

        let output = self.run_with_timeout(cmd)?;
        serde_json::from_slice(&output.stdout).map_err(|e| EngineFailure::Parse {
            message: format!("ffprobe json: {e}"),
        })
    }

    fn execute(&self, invocation: &Invocation) -> Result<(), EngineFailure> {
        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.args(invocation.ffmpeg_args());
        self.run_with_timeout(cmd).map(|_| ())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg_bin) && command_exists(&self.ffprobe_bin)
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(err) = pipe.read_to_end(&mut buf) {
            buf.extend_from_slice(format!("<failed to read child output: {err}>").as_bytes());
        }
        buf
    })
}

fn join(task: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    task.and_then(|t| t.join().ok()).unwrap_or_default()
}

fn status_label(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    }
}

/// Last [`STDERR_TAIL_BYTES`] of stderr, trimmed, on a char boundary.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

/// Whether `binary` resolves on `PATH` (or is an existing path).
pub fn command_exists(binary: &str) -> bool {
    if binary.contains('/') {
        return Path::new(binary).is_file();
    }
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builds_full_argument_list() {
        let inv = Invocation::new(Stage::Mux, "/out/final.mp4")
            .input(Path::new("/work/base.mp4"))
            .input_with(&["-stream_loop", "-1"], Path::new("/work/pip.mp4"))
            .args(["-c:v", "copy"]);

        assert_eq!(inv.inputs.len(), 2);
        assert_eq!(inv.arg_value("-c:v"), Some("copy"));
        assert_eq!(
            inv.ffmpeg_args(),
            vec![
                "-y",
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                "/work/base.mp4",
                "-stream_loop",
                "-1",
                "-i",
                "/work/pip.mp4",
                "-c:v",
                "copy",
                "/out/final.mp4",
            ]
        );
    }

    #[test]
    fn test_probe_report_parses_ffprobe_json() {
        let json = r#"{
            "streams": [
                {"index": 0, "codec_type": "audio", "duration": "12.500000"},
                {"index": 1, "codec_type": "video", "width": 1280, "height": 720,
                 "r_frame_rate": "30000/1001", "avg_frame_rate": "30000/1001", "duration": "12.512000"}
            ],
            "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "12.520000", "size": "1234"}
        }"#;
        let report: ProbeReport = serde_json::from_str(json).unwrap();
        let video = report.video_stream().unwrap();
        assert_eq!((video.width, video.height), (Some(1280), Some(720)));
        assert_eq!(video.duration_secs(), Some(12.512));
        assert_eq!(report.format_duration(), Some(12.52));
        assert!(report.has_audio());
    }

    #[test]
    fn test_na_duration_is_absent() {
        let stream = ProbeStream {
            duration: Some("N/A".to_string()),
            ..ProbeStream::default()
        };
        assert_eq!(stream.duration_secs(), None);
    }

    #[test]
    fn test_failures_map_to_stage_errors() {
        let inputs = vec![PathBuf::from("/clips/a.mov")];
        let exited = || EngineFailure::Exited {
            status: "1".to_string(),
            stderr: "Invalid data found when processing input".to_string(),
        };

        match exited().into_error(Stage::Normalize, &inputs) {
            NewsreelError::NormalizationFailed { clip, status, .. } => {
                assert_eq!(clip, inputs[0]);
                assert_eq!(status, "1");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            exited().into_error(Stage::PipResize, &inputs),
            NewsreelError::PipCompositionFailed { ref step, .. } if step == "pip-resize"
        ));
        assert!(matches!(
            exited().into_error(Stage::Mux, &inputs),
            NewsreelError::StageFailed { ref stage, .. } if stage == "mux"
        ));
        assert!(matches!(
            exited().into_error(Stage::Probe, &inputs),
            NewsreelError::MediaUnreadable { .. }
        ));

        let timeout = EngineFailure::TimedOut {
            timeout: Duration::from_secs(900),
        };
        match timeout.into_error(Stage::Assemble, &inputs) {
            NewsreelError::ExternalToolTimeout {
                stage,
                timeout_secs,
                ..
            } => {
                assert_eq!(stage, "assemble");
                assert_eq!(timeout_secs, 900.0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_stderr_tail_keeps_the_end() {
        let long = "x".repeat(STDERR_TAIL_BYTES) + "final line";
        let tail = stderr_tail(long.as_bytes());
        assert!(tail.starts_with("..."));
        assert!(tail.ends_with("final line"));
    }

    #[test]
    fn test_missing_binary_is_a_spawn_failure() {
        let engine = FfmpegEngine::new(
            "newsreel-no-such-ffmpeg",
            "newsreel-no-such-ffprobe",
            Duration::from_secs(5),
        );
        assert!(!engine.is_available());
        let err = engine.probe(Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(err, EngineFailure::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_child_is_killed_at_timeout() {
        let engine = FfmpegEngine::new("sleep", "sleep", Duration::from_millis(200));
        let started = Instant::now();
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let result = engine.run_with_timeout(cmd);
        assert!(matches!(result, Err(EngineFailure::TimedOut { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
