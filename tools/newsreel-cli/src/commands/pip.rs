//! Composite a talking head onto an existing video.

use std::path::PathBuf;

use newsreel_common::config::PipelineConfig;
use newsreel_render_engine::composite_pip_video;

pub async fn run(
    main: PathBuf,
    pip: PathBuf,
    width: u32,
    corner: String,
    config: PipelineConfig,
    output: PathBuf,
) -> anyhow::Result<()> {
    println!("Compositing picture-in-picture");
    println!("  Main: {}", main.display());
    println!("  PIP: {} ({width}px, {corner})", pip.display());
    println!("  Output: {}", output.display());

    let artifact = composite_pip_video(main, pip, width, corner, config, output)
        .await
        .map_err(|e| anyhow::anyhow!("PIP composition failed: {e}"))?;

    println!(
        "PIP complete: {} ({}x{}, {:.2}s)",
        artifact.path.display(),
        artifact.info.width,
        artifact.info.height,
        artifact.info.duration_secs
    );
    Ok(())
}
