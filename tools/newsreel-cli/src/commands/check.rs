//! Check system capabilities.

use newsreel_common::config::PipelineConfig;
use newsreel_render_engine::engine::command_exists;

pub fn run(config: &PipelineConfig) -> anyhow::Result<()> {
    println!("Newsreel System Check");
    println!("{}", "=".repeat(50));

    let tools = [
        ("ffmpeg", config.ffmpeg_bin.as_str()),
        ("ffprobe", config.ffprobe_bin.as_str()),
    ];
    let mut all_ok = true;
    for (label, binary) in tools {
        if command_exists(binary) {
            println!("[OK] {label}: {binary}");
        } else {
            all_ok = false;
            println!("[WARN] {label}: '{binary}' not found in PATH");
        }
    }

    match &config.overlay.font_file {
        Some(font) if font.is_file() => println!("[OK] Overlay font: {}", font.display()),
        Some(font) => println!("[WARN] Overlay font missing: {}", font.display()),
        None => println!("[OK] Overlay font: fontconfig default"),
    }

    println!();
    if all_ok {
        println!("All required tools are available. Newsreel is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg or set ffmpeg_bin/ffprobe_bin in the config.");
    }

    Ok(())
}
