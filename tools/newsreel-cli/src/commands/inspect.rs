//! Show media information for a file.

use std::path::PathBuf;

use newsreel_common::config::PipelineConfig;
use newsreel_render_engine::inspect::inspect;
use newsreel_render_engine::FfmpegEngine;

pub fn run(path: PathBuf, config: &PipelineConfig) -> anyhow::Result<()> {
    let engine = FfmpegEngine::from_config(config);
    let info = inspect(&engine, &path)
        .map_err(|e| anyhow::anyhow!("Failed to inspect media: {e}"))?;

    println!("Media: {}", path.display());
    println!("  Resolution: {}x{}", info.width, info.height);
    println!("  Aspect ratio: {:.3}", info.aspect_ratio());
    println!("  Duration: {:.3}s", info.duration_secs);
    println!("  Frame rate: {:.3}fps", info.frame_rate);
    Ok(())
}
