//! Scrolling text overlay rendering via ffmpeg `drawtext`.

use std::path::Path;

use newsreel_common::config::{OverlayStyle, PipelineConfig};
use newsreel_common::error::NewsreelResult;
use newsreel_media_model::media::Artifact;
use newsreel_media_model::overlay::OverlaySpec;

use crate::codec::{container_args, video_encoder_args};
use crate::engine::{run_invocation, Invocation, MediaEngine, Stage};
use crate::inspect::inspect;

/// File name of the wrapped script inside the scratch directory.
pub const TEXT_FILE_NAME: &str = "overlay.txt";

/// Escape a value for use inside a filter option within a filter graph.
///
/// Applies option-level escaping first, then graph-level escaping, as
/// ffmpeg unescapes in the reverse order.
pub fn escape_filter_value(value: &str) -> String {
    let mut option = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option.push('\\');
        }
        option.push(c);
    }

    let mut graph = String::with_capacity(option.len());
    for c in option.chars() {
        if matches!(c, '\\' | '\'' | ',' | ';' | '[' | ']') {
            graph.push('\\');
        }
        graph.push(c);
    }
    graph
}

/// The `drawtext` filter drawing `spec` from `text_file`.
///
/// Text expansion is off, so `%` and `\` in the script are drawn literally.
pub fn drawtext_filter(spec: &OverlaySpec, style: &OverlayStyle, text_file: &Path) -> String {
    let mut filter = format!(
        "drawtext=textfile={}:expansion=none",
        escape_filter_value(&text_file.to_string_lossy())
    );
    if let Some(font) = &style.font_file {
        filter.push_str(&format!(
            ":fontfile={}",
            escape_filter_value(&font.to_string_lossy())
        ));
    }
    filter.push_str(&format!(
        ":fontsize={size}:fontcolor={color}:line_spacing={spacing}:box=1:boxcolor={box_color}:boxborderw={border}:x=(w-text_w)/2:y={y}",
        size = style.font_size,
        color = escape_filter_value(&style.font_color),
        spacing = style.line_spacing,
        box_color = escape_filter_value(&style.box_color),
        border = style.box_border,
        y = spec.y_expr(),
    ));
    filter
}

/// Build the invocation drawing `spec` over `base`.
pub fn overlay_invocation(
    config: &PipelineConfig,
    base: &Artifact,
    spec: &OverlaySpec,
    text_file: &Path,
    output: &Path,
) -> Invocation {
    Invocation::new(Stage::Overlay, output)
        .input(&base.path)
        .args([
            "-vf".to_string(),
            drawtext_filter(spec, &config.overlay, text_file),
        ])
        .arg("-an")
        .args(video_encoder_args(config, &config.pixel_format))
        .args(container_args())
}

/// Draw the scrolling text over `base`.
///
/// The wrapped text is written to `scratch_dir` and read by drawtext from
/// there, so the script itself needs no filter escaping. The artifact
/// describes the written file as probed.
pub fn overlay(
    engine: &dyn MediaEngine,
    config: &PipelineConfig,
    base: &Artifact,
    spec: &OverlaySpec,
    scratch_dir: &Path,
    output: &Path,
) -> NewsreelResult<Artifact> {
    let text_file = scratch_dir.join(TEXT_FILE_NAME);
    std::fs::write(&text_file, &spec.text)?;

    tracing::info!(
        lines = spec.line_count,
        scroll_speed = spec.scroll_speed,
        position = ?spec.position,
        "Rendering text overlay"
    );

    let invocation = overlay_invocation(config, base, spec, &text_file, output);
    run_invocation(engine, &invocation)?;
    Ok(Artifact::new(output, inspect(engine, output)?))
}
