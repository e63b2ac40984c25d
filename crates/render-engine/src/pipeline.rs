//! End-to-end composition of a news video.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use newsreel_common::config::PipelineConfig;
use newsreel_common::error::{NewsreelError, NewsreelResult};
use newsreel_media_model::job::NewsJob;
use newsreel_media_model::media::{Artifact, Clip};
use newsreel_media_model::overlay::OverlaySpec;
use newsreel_media_model::placement::{Corner, PipPlacement};
use newsreel_media_model::timeline::{EntryRole, Timeline};
use serde::{Deserialize, Serialize};

use crate::assemble::assemble;
use crate::engine::{FfmpegEngine, MediaEngine};
use crate::inspect::{inspect_clip, probe_duration};
use crate::mux::mux;
use crate::normalize::{normalize, normalize_all, DroppedClip, NormalizeTarget};
use crate::overlay::overlay;
use crate::pip::{check_inputs, composite, composite_clips};
use crate::scratch::{commit, pip_output_path, report_path, Scratch};

/// Stages of a composition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Inspecting,
    Normalizing,
    Assembling,
    Overlaying,
    Muxing,
    Compositing,
    Complete,
    Failed,
}

impl PipelineStage {
    /// Rough share of the run completed when this stage starts.
    fn progress(self) -> f64 {
        match self {
            PipelineStage::Inspecting => 0.0,
            PipelineStage::Normalizing => 0.05,
            PipelineStage::Assembling => 0.45,
            PipelineStage::Overlaying => 0.6,
            PipelineStage::Muxing => 0.8,
            PipelineStage::Compositing => 0.85,
            PipelineStage::Complete | PipelineStage::Failed => 1.0,
        }
    }
}

/// Progress report for a composition run.
#[derive(Debug, Clone)]
pub struct PipelineProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Current stage.
    pub stage: PipelineStage,

    /// Human-readable detail (error text for `Failed`).
    pub message: String,
}

/// Progress callback for composition runs.
pub type ProgressCallback = Box<dyn Fn(PipelineProgress) + Send>;

/// How the timeline covered the target duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSummary {
    pub target_secs: f64,
    pub entries: usize,
    pub loops: usize,
    pub trimmed: usize,
    pub has_intro: bool,
}

impl From<&Timeline> for TimelineSummary {
    fn from(timeline: &Timeline) -> Self {
        Self {
            target_secs: timeline.target_secs,
            entries: timeline.entries.len(),
            loops: timeline.loops,
            trimmed: timeline.trimmed_count(),
            has_intro: timeline
                .entries
                .first()
                .is_some_and(|e| e.role == EntryRole::Intro),
        }
    }
}

/// Summary of a successful run, also written next to the output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub output: Artifact,
    pub pip: Option<Artifact>,
    pub narration: Option<PathBuf>,
    pub overlay_applied: bool,
    pub timeline: TimelineSummary,
    pub dropped_clips: Vec<DroppedClip>,
    /// Soft problems, such as a duration mismatch.
    pub warnings: Vec<String>,
    pub engine: String,
    pub elapsed_secs: f64,
    pub finished_at: DateTime<Utc>,
}

impl PipelineReport {
    pub fn write(&self, path: &Path) -> NewsreelResult<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Inputs that survived inspection.
struct Inspected {
    clips: Vec<Clip>,
    intro: Option<Clip>,
    pip: Option<Clip>,
    narration: Option<(PathBuf, f64)>,
    dropped: Vec<DroppedClip>,
}

/// Runs the stages in order against one media engine.
pub struct NewsPipeline {
    config: PipelineConfig,
    engine: Arc<dyn MediaEngine>,
    progress: Option<ProgressCallback>,
}

impl NewsPipeline {
    pub fn new(config: PipelineConfig, engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            config,
            engine,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn emit(&self, stage: PipelineStage, message: impl Into<String>) {
        if let Some(cb) = &self.progress {
            cb(PipelineProgress {
                progress: stage.progress(),
                stage,
                message: message.into(),
            });
        }
    }

    /// Compose `job` into `output`, then the PIP variant next to it when
    /// the job asks for one.
    ///
    /// Inputs are validated before anything is invoked. Intermediates live in
    /// a scratch directory beside `output`; it is removed on success and
    /// kept on failure when `keep_intermediates_on_failure` is set.
    pub fn compose(&self, job: &NewsJob, output: &Path) -> NewsreelResult<PipelineReport> {
        let started = Instant::now();
        self.config.validate()?;
        job.validate_sources()?;
        if job.clips.is_empty() {
            return Err(NewsreelError::NoClipsAvailable);
        }
        if job.pip.as_ref().is_some_and(|p| p.width == 0) {
            return Err(NewsreelError::invalid_input("PIP width must be positive"));
        }

        tracing::info!(
            output = %output.display(),
            clips = job.clips.len(),
            intro = job.intro.is_some(),
            narration = job.audio.is_some(),
            pip = job.pip.is_some(),
            engine = self.engine.name(),
            "Starting composition"
        );

        let scratch = Scratch::new_in(output_dir(output))?;
        match self.run(job, output, &scratch, started) {
            Ok(report) => {
                drop(scratch);
                tracing::info!(
                    output = %report.output.path.display(),
                    elapsed_secs = report.elapsed_secs,
                    warnings = report.warnings.len(),
                    "Composition finished"
                );
                self.emit(PipelineStage::Complete, "done");
                Ok(report)
            }
            Err(err) => {
                self.fail(scratch, &err);
                Err(err)
            }
        }
    }

    /// Composite `pip` onto `main`, writing `output`.
    pub fn composite_pip(
        &self,
        main: &Path,
        pip: &Path,
        target_width: u32,
        corner_name: &str,
        output: &Path,
    ) -> NewsreelResult<Artifact> {
        self.config.validate()?;
        check_inputs(main, pip, target_width)?;

        let scratch = Scratch::new_in(output_dir(output))?;
        match self.run_pip(main, pip, target_width, corner_name, output, &scratch) {
            Ok(artifact) => {
                drop(scratch);
                self.emit(PipelineStage::Complete, "done");
                Ok(artifact)
            }
            Err(err) => {
                self.fail(scratch, &err);
                Err(err)
            }
        }
    }

    fn run_pip(
        &self,
        main: &Path,
        pip: &Path,
        target_width: u32,
        corner_name: &str,
        output: &Path,
        scratch: &Scratch,
    ) -> NewsreelResult<Artifact> {
        self.emit(PipelineStage::Compositing, "compositing picture-in-picture");
        let composited = composite(
            self.engine.as_ref(),
            &self.config,
            main,
            pip,
            target_width,
            corner_name,
            scratch.path(),
            &scratch.join("pip.mp4"),
        )?;
        commit(&composited, output)
    }

    fn fail(&self, scratch: Scratch, err: &NewsreelError) {
        if self.config.keep_intermediates_on_failure {
            let kept = scratch.preserve();
            tracing::error!(
                error = %err,
                scratch = %kept.display(),
                "Composition failed; intermediates kept"
            );
        } else {
            tracing::error!(error = %err, "Composition failed");
        }
        self.emit(PipelineStage::Failed, err.to_string());
    }

    fn run(
        &self,
        job: &NewsJob,
        output: &Path,
        scratch: &Scratch,
        started: Instant,
    ) -> NewsreelResult<PipelineReport> {
        let engine = self.engine.as_ref();
        let config = &self.config;
        let mut warnings = Vec::new();

        self.emit(PipelineStage::Inspecting, "inspecting inputs");
        let inspected = self.inspect_inputs(job)?;
        let target_secs = inspected
            .narration
            .as_ref()
            .map_or(config.default_duration_secs, |(_, secs)| *secs);
        tracing::info!(
            clips = inspected.clips.len(),
            dropped = inspected.dropped.len(),
            target_secs,
            "Inputs inspected"
        );

        self.emit(
            PipelineStage::Normalizing,
            format!("normalizing {} clips", inspected.clips.len()),
        );
        let normalized = normalize_all(engine, config, &inspected.clips, scratch.path(), "clip")?;
        let intro = match &inspected.intro {
            Some(intro) => Some(normalize(
                engine,
                config,
                &NormalizeTarget::from_config(config),
                intro,
                &scratch.join("intro.mp4"),
            )?),
            None => None,
        };
        let mut dropped = inspected.dropped;
        dropped.extend(normalized.dropped);

        self.emit(PipelineStage::Assembling, "assembling sequence");
        let assembled = assemble(
            engine,
            config,
            intro.as_ref(),
            &normalized.clips,
            target_secs,
            &scratch.join("base.mp4"),
        )?;
        let timeline = assembled.timeline;
        let mut current = assembled.artifact;

        let spec = job.visible_script().and_then(|script| {
            OverlaySpec::derive(
                script,
                current.info.width,
                current.info.height,
                current.info.duration_secs,
                &config.overlay,
            )
        });
        let overlay_applied = spec.is_some();
        match spec {
            Some(spec) => {
                self.emit(PipelineStage::Overlaying, "rendering text overlay");
                current = overlay(
                    engine,
                    config,
                    &current,
                    &spec,
                    scratch.path(),
                    &scratch.join("overlaid.mp4"),
                )?;
            }
            None => tracing::info!("No script text; skipping overlay"),
        }

        match &inspected.narration {
            Some((audio, audio_secs)) => {
                self.emit(PipelineStage::Muxing, "muxing narration");
                let muxed = mux(
                    engine,
                    config,
                    &current,
                    audio,
                    *audio_secs,
                    &scratch.join("final.mp4"),
                )?;
                if let Some(warning) = muxed.warning {
                    warnings.push(warning.to_string());
                }
                current = muxed.artifact;
            }
            None => tracing::info!(
                duration_secs = target_secs,
                "No narration; producing silent video"
            ),
        }

        let final_video = commit(&current, output)?;

        let pip = match (&job.pip, &inspected.pip) {
            (Some(request), Some(pip_clip)) => {
                self.emit(PipelineStage::Compositing, "compositing picture-in-picture");
                let composited = composite_clips(
                    engine,
                    config,
                    &final_video.as_clip(),
                    pip_clip,
                    request.width,
                    &request.corner,
                    scratch.path(),
                    &scratch.join("pip.mp4"),
                )?;
                Some(commit(&composited, &pip_output_path(output))?)
            }
            _ => None,
        };

        let report = PipelineReport {
            output: final_video,
            pip,
            narration: inspected.narration.map(|(path, _)| path),
            overlay_applied,
            timeline: TimelineSummary::from(&timeline),
            dropped_clips: dropped,
            warnings,
            engine: engine.name().to_string(),
            elapsed_secs: started.elapsed().as_secs_f64(),
            finished_at: Utc::now(),
        };

        let path = report_path(output);
        report.write(&path)?;
        tracing::info!(report = %path.display(), "Wrote composition report");
        Ok(report)
    }

    /// Probe every input. Unreadable content clips are dropped when
    /// `drop_failed_clips` is set; every other input is required.
    fn inspect_inputs(&self, job: &NewsJob) -> NewsreelResult<Inspected> {
        let engine = self.engine.as_ref();
        let mut clips = Vec::with_capacity(job.clips.len());
        let mut dropped = Vec::new();
        let mut first_failure = None;

        for path in &job.clips {
            match inspect_clip(engine, path) {
                Ok(clip) => clips.push(clip),
                Err(err @ NewsreelError::MediaUnreadable { .. }) if self.config.drop_failed_clips => {
                    tracing::warn!(clip = %path.display(), error = %err, "Dropping unreadable clip");
                    dropped.push(DroppedClip {
                        path: path.clone(),
                        reason: err.to_string(),
                    });
                    first_failure.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }
        if clips.is_empty() {
            return Err(first_failure.unwrap_or(NewsreelError::NoClipsAvailable));
        }

        let intro = job
            .intro
            .as_deref()
            .map(|path| inspect_clip(engine, path))
            .transpose()?;

        let narration = match &job.audio {
            Some(path) => Some((path.clone(), probe_duration(engine, path)?)),
            None => None,
        };

        // The PIP box is checked against the output frame now, so a bad
        // request fails before anything is rendered.
        let pip = match &job.pip {
            Some(request) => {
                let pip = inspect_clip(engine, &request.path)?;
                let (corner, _) = Corner::resolve(&request.corner);
                PipPlacement::compute(
                    self.config.width,
                    self.config.height,
                    pip.info.width,
                    pip.info.height,
                    request.width,
                    self.config.pip_padding,
                    corner,
                )?;
                Some(pip)
            }
            None => None,
        };

        Ok(Inspected {
            clips,
            intro,
            pip,
            narration,
            dropped,
        })
    }
}

fn output_dir(output: &Path) -> &Path {
    output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Compose a news video with the ffmpeg engine.
///
/// This is the main entry point for rendering. The blocking pipeline runs on
/// tokio's blocking pool.
pub async fn compose_news_video(
    job: NewsJob,
    config: PipelineConfig,
    output: PathBuf,
    progress: Option<ProgressCallback>,
) -> NewsreelResult<PipelineReport> {
    let pipeline = ffmpeg_pipeline(config, progress)?;
    tokio::task::spawn_blocking(move || pipeline.compose(&job, &output))
        .await
        .map_err(|e| NewsreelError::Other(anyhow::anyhow!("composition task failed: {e}")))?
}

/// Composite a talking head onto an existing video with the ffmpeg engine.
pub async fn composite_pip_video(
    main: PathBuf,
    pip: PathBuf,
    target_width: u32,
    corner: String,
    config: PipelineConfig,
    output: PathBuf,
) -> NewsreelResult<Artifact> {
    let pipeline = ffmpeg_pipeline(config, None)?;
    tokio::task::spawn_blocking(move || {
        pipeline.composite_pip(&main, &pip, target_width, &corner, &output)
    })
    .await
    .map_err(|e| NewsreelError::Other(anyhow::anyhow!("PIP task failed: {e}")))?
}

fn ffmpeg_pipeline(
    config: PipelineConfig,
    progress: Option<ProgressCallback>,
) -> NewsreelResult<NewsPipeline> {
    let engine = FfmpegEngine::from_config(&config);
    if !engine.is_available() {
        return Err(NewsreelError::config(format!(
            "No media engine found (expected '{}' and '{}' in PATH)",
            engine.ffmpeg_bin(),
            engine.ffprobe_bin()
        )));
    }
    tracing::info!(engine = engine.name(), "Using media engine");

    let pipeline = NewsPipeline::new(config, Arc::new(engine));
    Ok(match progress {
        Some(cb) => pipeline.with_progress(cb),
        None => pipeline,
    })
}
