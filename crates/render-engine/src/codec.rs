//! Encoder argument sets shared by the re-encoding stages.

use newsreel_common::config::PipelineConfig;

/// Video encoder flags: codec, preset, pixel format and color tags.
pub fn video_encoder_args(config: &PipelineConfig, pixel_format: &str) -> Vec<String> {
    let mut args = vec![
        "-c:v".to_string(),
        config.video_codec.clone(),
        "-preset".to_string(),
        config.video_preset.clone(),
        "-pix_fmt".to_string(),
        pixel_format.to_string(),
    ];
    args.extend(config.color.encoder_args());
    args
}

/// Audio encoder flags for the narration track.
pub fn audio_encoder_args(config: &PipelineConfig) -> Vec<String> {
    if config.audio_codec == "copy" {
        return vec!["-c:a".to_string(), "copy".to_string()];
    }
    vec![
        "-c:a".to_string(),
        config.audio_codec.clone(),
        "-b:a".to_string(),
        format!("{}k", config.audio_bitrate_kbps.max(32)),
    ]
}

/// Container flags for files meant to be played back progressively.
pub fn container_args() -> Vec<String> {
    vec!["-movflags".to_string(), "+faststart".to_string()]
}
