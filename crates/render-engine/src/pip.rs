//! Picture-in-picture compositing.
//!
//! Two invocations: the PIP clip is resized once, then overlaid onto the
//! main video at the corner placement. A failed resize stops before the
//! overlay.

use std::path::Path;

use newsreel_common::config::PipelineConfig;
use newsreel_common::error::{NewsreelError, NewsreelResult};
use newsreel_common::timing::format_secs;
use newsreel_media_model::media::{Artifact, Clip, MediaInfo};
use newsreel_media_model::placement::{Corner, PipPlacement};

use crate::codec::{container_args, video_encoder_args};
use crate::engine::{run_invocation, Invocation, MediaEngine, Stage};
use crate::inspect::inspect_clip;

/// Pixel format of the resized PIP intermediate. 4:4:4 has no chroma
/// subsampling, so odd PIP sizes are encodable.
pub const PIP_INTERMEDIATE_FORMAT: &str = "yuv444p";

/// File name of the resized PIP inside the scratch directory.
pub const RESIZED_FILE_NAME: &str = "pip_resized.mp4";

/// Resolve the corner name and compute the PIP box.
///
/// Unknown corner names fall back to bottom-right with a warning.
pub fn plan_placement(
    config: &PipelineConfig,
    main: &MediaInfo,
    pip: &MediaInfo,
    target_width: u32,
    corner_name: &str,
) -> NewsreelResult<(Corner, PipPlacement)> {
    let (corner, fell_back) = Corner::resolve(corner_name);
    if fell_back {
        tracing::warn!(
            requested = corner_name,
            using = %corner,
            "Unknown PIP corner, falling back"
        );
    }

    let placement = PipPlacement::compute(
        main.width,
        main.height,
        pip.width,
        pip.height,
        target_width,
        config.pip_padding,
        corner,
    )?;
    Ok((corner, placement))
}

/// Build the invocation resizing the PIP clip to the placement size.
pub fn resize_invocation(
    config: &PipelineConfig,
    pip: &Clip,
    placement: &PipPlacement,
    output: &Path,
) -> Invocation {
    let filter = format!(
        "scale={w}:{h}:flags=lanczos,setsar=1,fps={fps},format={pix}",
        w = placement.width,
        h = placement.height,
        fps = config.fps,
        pix = PIP_INTERMEDIATE_FORMAT,
    );
    Invocation::new(Stage::PipResize, output)
        .input(&pip.path)
        .args(["-vf".to_string(), filter])
        .arg("-an")
        .args(video_encoder_args(config, PIP_INTERMEDIATE_FORMAT))
}

/// Build the invocation overlaying the resized PIP onto `main`.
///
/// The PIP input loops so a short talking head still covers the whole main
/// video; the output ends with the main stream.
pub fn overlay_invocation(
    config: &PipelineConfig,
    main: &Clip,
    resized: &Path,
    placement: &PipPlacement,
    output: &Path,
) -> Invocation {
    let graph = format!(
        "[1:v]setpts=PTS-STARTPTS[pip];[0:v][pip]overlay=x={x}:y={y}:shortest=1,format={pix}[vout]",
        x = placement.x,
        y = placement.y,
        pix = config.pixel_format,
    );
    Invocation::new(Stage::PipOverlay, output)
        .input(&main.path)
        .input_with(&["-stream_loop", "-1"], resized)
        .args(["-filter_complex".to_string(), graph])
        .args(["-map", "[vout]", "-map", "0:a?"])
        .args(video_encoder_args(config, &config.pixel_format))
        .args(["-c:a", "copy"])
        .args(["-t".to_string(), format_secs(main.duration_secs())])
        .args(container_args())
}

/// Composite `pip` onto `main`, both already inspected.
pub fn composite_clips(
    engine: &dyn MediaEngine,
    config: &PipelineConfig,
    main: &Clip,
    pip: &Clip,
    target_width: u32,
    corner_name: &str,
    scratch_dir: &Path,
    output: &Path,
) -> NewsreelResult<Artifact> {
    let (corner, placement) = plan_placement(config, &main.info, &pip.info, target_width, corner_name)?;
    tracing::info!(
        corner = %corner,
        x = placement.x,
        y = placement.y,
        width = placement.width,
        height = placement.height,
        "Compositing picture-in-picture"
    );

    let resized = scratch_dir.join(RESIZED_FILE_NAME);
    run_invocation(engine, &resize_invocation(config, pip, &placement, &resized))?;
    run_invocation(
        engine,
        &overlay_invocation(config, main, &resized, &placement, output),
    )?;

    Ok(Artifact::new(output, main.info))
}

/// Check a PIP request before anything is probed: both files must exist and
/// the target width must be positive.
pub fn check_inputs(main: &Path, pip: &Path, target_width: u32) -> NewsreelResult<()> {
    for path in [main, pip] {
        if !path.exists() {
            return Err(NewsreelError::missing_asset(path));
        }
    }
    if target_width == 0 {
        return Err(NewsreelError::invalid_input("PIP width must be positive"));
    }
    Ok(())
}

/// Composite the video at `pip` onto the video at `main`.
///
/// Both files must exist; nothing is invoked otherwise.
pub fn composite(
    engine: &dyn MediaEngine,
    config: &PipelineConfig,
    main: &Path,
    pip: &Path,
    target_width: u32,
    corner_name: &str,
    scratch_dir: &Path,
    output: &Path,
) -> NewsreelResult<Artifact> {
    check_inputs(main, pip, target_width)?;

    let main_clip = inspect_clip(engine, main)?;
    let pip_clip = inspect_clip(engine, pip)?;
    composite_clips(
        engine,
        config,
        &main_clip,
        &pip_clip,
        target_width,
        corner_name,
        scratch_dir,
        output,
    )
}
