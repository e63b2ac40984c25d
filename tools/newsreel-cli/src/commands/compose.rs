//! Compose a news video from a job folder.

use std::path::PathBuf;

use newsreel_common::config::PipelineConfig;
use newsreel_media_model::job::{NewsJob, PipRequest};
use newsreel_render_engine::scratch::report_path;
use newsreel_render_engine::{compose_news_video, PipelineProgress, ProgressCallback};

/// File name used when no output is given.
const DEFAULT_OUTPUT_NAME: &str = "final_video.mp4";

/// Command-line adjustments applied on top of the discovered job and config.
pub struct Overrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub intro: Option<PathBuf>,
    pub no_overlay: bool,
    pub pip: Option<PathBuf>,
    pub pip_width: u32,
    pub corner: String,
}

impl Overrides {
    fn apply(self, mut job: NewsJob, config: &mut PipelineConfig) -> NewsJob {
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(intro) = self.intro {
            job = job.with_intro(intro);
        }
        if self.no_overlay {
            job.script = None;
        }
        if let Some(pip) = self.pip {
            job = job.with_pip(PipRequest::new(pip, self.pip_width, self.corner));
        }
        job
    }
}

pub async fn run(
    job_dir: PathBuf,
    output: Option<PathBuf>,
    overrides: Overrides,
    mut config: PipelineConfig,
) -> anyhow::Result<()> {
    println!("Composing news video from: {}", job_dir.display());

    let job = NewsJob::discover(&job_dir)
        .map_err(|e| anyhow::anyhow!("Failed to read job folder: {e}"))?;
    let job = overrides.apply(job, &mut config);
    let output_path = output.unwrap_or_else(|| job_dir.join(DEFAULT_OUTPUT_NAME));

    println!("  Clips: {}", job.clips.len());
    if let Some(ref intro) = job.intro {
        println!("  Intro: {}", intro.display());
    }
    match job.audio {
        Some(ref audio) => println!("  Narration: {}", audio.display()),
        None => println!(
            "  Narration: none (silent, {:.0}s)",
            config.default_duration_secs
        ),
    }
    println!(
        "  Overlay: {}",
        if job.visible_script().is_some() { "yes" } else { "no" }
    );
    println!(
        "  Resolution: {}x{} @ {}fps",
        config.width, config.height, config.fps
    );
    println!("  Output: {}", output_path.display());

    let progress_cb: ProgressCallback = Box::new(|p: PipelineProgress| {
        print!(
            "\r  Progress: {:.1}% ({:?}: {})  ",
            p.progress * 100.0,
            p.stage,
            p.message
        );
    });

    let report = compose_news_video(job, config, output_path.clone(), Some(progress_cb))
        .await
        .map_err(|e| anyhow::anyhow!("Composition failed: {e}"))?;

    println!("\nComposition complete: {}", report.output.path.display());
    println!(
        "  Duration: {:.2}s ({} timeline entries, {} loops, {} trimmed)",
        report.output.info.duration_secs,
        report.timeline.entries,
        report.timeline.loops,
        report.timeline.trimmed
    );
    if let Some(ref pip) = report.pip {
        println!("  PIP: {}", pip.path.display());
    }
    for dropped in &report.dropped_clips {
        println!("  [WARN] Dropped {}: {}", dropped.path.display(), dropped.reason);
    }
    for warning in &report.warnings {
        println!("  [WARN] {warning}");
    }
    println!("  Report: {}", report_path(&output_path).display());
    println!("  Elapsed: {:.1}s", report.elapsed_secs);

    Ok(())
}
