//! Clip normalization: one canonical resolution, frame rate, pixel format
//! and color description for every clip, so the assembler can concatenate
//! them without per-clip adjustments.

use std::path::{Path, PathBuf};

use newsreel_common::config::{ColorSpec, PipelineConfig, ScalePolicy};
use newsreel_common::error::{NewsreelError, NewsreelResult};
use newsreel_media_model::media::Clip;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::codec::video_encoder_args;
use crate::engine::{run_invocation, Invocation, MediaEngine, Stage};
use crate::inspect::inspect;

/// Canonical format every clip is converted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeTarget {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub pixel_format: String,
    pub color: ColorSpec,
    pub scale_policy: ScalePolicy,
}

impl NormalizeTarget {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
            pixel_format: config.pixel_format.clone(),
            color: config.color.clone(),
            scale_policy: config.scale_policy,
        }
    }

    /// The `-vf` chain converting any clip to this target.
    pub fn video_filter(&self) -> String {
        let (w, h) = (self.width, self.height);
        let fit = match self.scale_policy {
            ScalePolicy::Letterbox => format!(
                "scale={w}:{h}:force_original_aspect_ratio=decrease:flags=lanczos,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black"
            ),
            ScalePolicy::Stretch => format!("scale={w}:{h}:flags=lanczos"),
        };
        format!(
            "{fit},setsar=1,fps={fps},format={pix}",
            fps = self.fps,
            pix = self.pixel_format
        )
    }
}

/// A clip left out of the run, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedClip {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of normalizing a batch of clips.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    /// Normalized clips in input order.
    pub clips: Vec<Clip>,
    pub dropped: Vec<DroppedClip>,
}

/// Build the invocation normalizing `clip` into `output`.
pub fn normalize_invocation(
    config: &PipelineConfig,
    target: &NormalizeTarget,
    clip: &Clip,
    output: &Path,
) -> Invocation {
    Invocation::new(Stage::Normalize, output)
        .input(&clip.path)
        .args(["-vf".to_string(), target.video_filter()])
        .arg("-an")
        .args(video_encoder_args(config, &target.pixel_format))
}

/// Convert one clip to `target`, writing `output`.
///
/// The returned clip describes the written file as probed, since frame rate
/// conversion can shift its length by a fraction of a frame. The source file
/// is never modified.
pub fn normalize(
    engine: &dyn MediaEngine,
    config: &PipelineConfig,
    target: &NormalizeTarget,
    clip: &Clip,
    output: &Path,
) -> NewsreelResult<Clip> {
    let invocation = normalize_invocation(config, target, clip, output);
    run_invocation(engine, &invocation)?;

    let info = inspect(engine, output).map_err(|err| match err {
        NewsreelError::MediaUnreadable { reason, .. } => NewsreelError::NormalizationFailed {
            clip: clip.path.clone(),
            status: "unreadable output".to_string(),
            stderr: reason,
        },
        other => other,
    })?;
    tracing::debug!(
        clip = %clip.path.display(),
        source_secs = clip.duration_secs(),
        normalized_secs = info.duration_secs,
        "Clip normalized"
    );
    Ok(Clip::new(output, info))
}

/// Normalize `clips` into `out_dir` as `<prefix>_NNN.mp4`.
///
/// Runs on a rayon pool of [`PipelineConfig::workers`] threads; results keep
/// input order. A clip whose normalization fails is dropped when
/// `drop_failed_clips` is set; if none survive, the first failure is
/// returned.
pub fn normalize_all(
    engine: &dyn MediaEngine,
    config: &PipelineConfig,
    clips: &[Clip],
    out_dir: &Path,
    prefix: &str,
) -> NewsreelResult<NormalizeOutcome> {
    if clips.is_empty() {
        return Err(NewsreelError::NoClipsAvailable);
    }

    let target = NormalizeTarget::from_config(config);
    let outputs: Vec<PathBuf> = (0..clips.len())
        .map(|i| out_dir.join(format!("{prefix}_{i:03}.mp4")))
        .collect();

    let workers = config.workers().min(clips.len());
    let started = std::time::Instant::now();
    tracing::info!(
        clips = clips.len(),
        workers,
        filter = %target.video_filter(),
        "Normalizing clips"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("newsreel-normalize-{i}"))
        .build()
        .map_err(|e| NewsreelError::Other(anyhow::anyhow!("failed to build normalize pool: {e}")))?;
    let results: Vec<NewsreelResult<Clip>> = pool.install(|| {
        clips
            .par_iter()
            .zip(outputs.par_iter())
            .map(|(clip, out)| normalize(engine, config, &target, clip, out))
            .collect()
    });

    let mut outcome = NormalizeOutcome::default();
    let mut first_failure = None;

    for (clip, result) in clips.iter().zip(results) {
        match result {
            Ok(normalized) => outcome.clips.push(normalized),
            Err(err @ NewsreelError::NormalizationFailed { .. }) if config.drop_failed_clips => {
                tracing::warn!(
                    clip = %clip.path.display(),
                    error = %err,
                    "Dropping clip that failed to normalize"
                );
                outcome.dropped.push(DroppedClip {
                    path: clip.path.clone(),
                    reason: err.to_string(),
                });
                first_failure.get_or_insert(err);
            }
            Err(err) => return Err(err),
        }
    }

    if outcome.clips.is_empty() {
        return Err(first_failure.unwrap_or(NewsreelError::NoClipsAvailable));
    }

    tracing::info!(
        normalized = outcome.clips.len(),
        dropped = outcome.dropped.len(),
        elapsed_ms = started.elapsed().as_millis(),
        "Clips normalized"
    );
    Ok(outcome)
}
