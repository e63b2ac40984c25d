//! Sequence assembly: one base stream of exactly the target duration.

use std::path::Path;

use newsreel_common::config::PipelineConfig;
use newsreel_common::error::NewsreelResult;
use newsreel_common::timing::{format_secs, frame_duration_secs, within_one_frame};
use newsreel_media_model::media::{Artifact, Clip};
use newsreel_media_model::timeline::Timeline;

use crate::codec::{container_args, video_encoder_args};
use crate::engine::{run_invocation, Invocation, MediaEngine, Stage};
use crate::inspect::inspect;

/// An assembled base video and the plan it was rendered from.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub timeline: Timeline,
    pub artifact: Artifact,
}

/// Build the concat filter graph for `timeline`.
///
/// Each input is rebased to zero and resampled to the output rate before
/// `concat`, so clips with different time bases join without gaps. The
/// joined stream is padded by one cloned frame; `-t` cuts it back to the
/// target, so rate rounding never leaves the output short.
pub fn build_concat_graph(timeline: &Timeline, fps: u32, pixel_format: &str) -> String {
    let mut graph = String::new();
    let mut labels = String::new();

    for (i, entry) in timeline.entries.iter().enumerate() {
        graph.push_str(&format!("[{i}:v]settb=AVTB,setpts=PTS-STARTPTS"));
        if entry.is_trimmed() {
            graph.push_str(&format!(
                ",trim=duration={},setpts=PTS-STARTPTS",
                format_secs(entry.used_secs)
            ));
        }
        graph.push_str(&format!(",fps={fps}"));
        if entry.hold_secs > 0.0 {
            graph.push_str(&format!(
                ",tpad=stop_mode=clone:stop_duration={}",
                format_secs(entry.hold_secs)
            ));
        }
        graph.push_str(&format!("[v{i}];"));
        labels.push_str(&format!("[v{i}]"));
    }

    graph.push_str(&format!(
        "{labels}concat=n={n}:v=1:a=0,tpad=stop_mode=clone:stop_duration={pad},format={pixel_format}[vout]",
        n = timeline.entries.len(),
        pad = format_secs(frame_duration_secs(fps as f64)),
    ));
    graph
}

/// Build the invocation rendering `timeline` into `output`.
pub fn assemble_invocation(config: &PipelineConfig, timeline: &Timeline, output: &Path) -> Invocation {
    let graph = build_concat_graph(timeline, config.fps, &config.pixel_format);

    timeline
        .entries
        .iter()
        .fold(Invocation::new(Stage::Assemble, output), |inv, entry| {
            inv.input(&entry.clip.path)
        })
        .args(["-filter_complex".to_string(), graph])
        .args(["-map", "[vout]", "-an"])
        .args(["-t".to_string(), format_secs(timeline.target_secs)])
        .args(video_encoder_args(config, &config.pixel_format))
        .args(container_args())
}

/// Render a planned timeline. The artifact describes the written file as
/// probed.
pub fn assemble_timeline(
    engine: &dyn MediaEngine,
    config: &PipelineConfig,
    timeline: &Timeline,
    output: &Path,
) -> NewsreelResult<Artifact> {
    tracing::info!(
        entries = timeline.entries.len(),
        loops = timeline.loops,
        trimmed = timeline.trimmed_count(),
        target_secs = timeline.target_secs,
        "Assembling sequence"
    );

    let invocation = assemble_invocation(config, timeline, output);
    run_invocation(engine, &invocation)?;

    let info = inspect(engine, output)?;
    if !within_one_frame(info.duration_secs, timeline.target_secs, config.fps as f64) {
        tracing::warn!(
            assembled_secs = info.duration_secs,
            target_secs = timeline.target_secs,
            "Assembled sequence is off target by more than one frame"
        );
    }
    Ok(Artifact::new(output, info))
}

/// Concatenate normalized `clips` (after an optional `intro`), looping or
/// trimming so the result lasts `target_secs`.
pub fn assemble(
    engine: &dyn MediaEngine,
    config: &PipelineConfig,
    intro: Option<&Clip>,
    clips: &[Clip],
    target_secs: f64,
    output: &Path,
) -> NewsreelResult<Assembled> {
    let timeline = Timeline::plan(intro, clips, target_secs, config.fill_policy)?;
    let artifact = assemble_timeline(engine, config, &timeline, output)?;
    Ok(Assembled { timeline, artifact })
}
