//! Narration muxing.

use std::path::Path;

use newsreel_common::config::PipelineConfig;
use newsreel_common::error::{NewsreelError, NewsreelResult};
use newsreel_common::timing::{format_secs, DurationDrift};
use newsreel_media_model::media::Artifact;

use crate::codec::{audio_encoder_args, container_args};
use crate::engine::{run_invocation, Invocation, MediaEngine, Stage};

/// A muxed artifact plus the soft duration warning, if any.
#[derive(Debug)]
pub struct Muxed {
    pub artifact: Artifact,
    /// `DurationMismatch` when video and audio disagree beyond tolerance.
    pub warning: Option<NewsreelError>,
}

/// Build the invocation attaching `audio` to `video`, bounded to `duration_secs`.
pub fn mux_invocation(
    config: &PipelineConfig,
    video: &Artifact,
    audio: &Path,
    duration_secs: f64,
    output: &Path,
) -> Invocation {
    Invocation::new(Stage::Mux, output)
        .input(&video.path)
        .input(audio)
        .args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy"])
        .args(audio_encoder_args(config))
        .args(["-t".to_string(), format_secs(duration_secs)])
        .args(container_args())
}

/// Attach the narration at `audio` (lasting `audio_secs`) to `video`.
///
/// The video stream is copied. A duration difference beyond the configured
/// tolerance is reported as a warning and the output is cut to the shorter
/// of the two.
pub fn mux(
    engine: &dyn MediaEngine,
    config: &PipelineConfig,
    video: &Artifact,
    audio: &Path,
    audio_secs: f64,
    output: &Path,
) -> NewsreelResult<Muxed> {
    let drift = DurationDrift {
        video_secs: video.info.duration_secs,
        audio_secs,
    };
    let tolerance_secs = config.tolerance_secs();

    let warning = drift.exceeds(tolerance_secs).then(|| {
        let mismatch = NewsreelError::DurationMismatch {
            video_secs: drift.video_secs,
            audio_secs: drift.audio_secs,
            tolerance_secs,
        };
        tracing::warn!(
            video_secs = drift.video_secs,
            audio_secs = drift.audio_secs,
            drift_secs = drift.drift_secs(),
            "{mismatch}; output bounded to the shorter stream"
        );
        mismatch
    });

    let duration_secs = drift.shorter_secs();
    let invocation = mux_invocation(config, video, audio, duration_secs, output);
    run_invocation(engine, &invocation)?;

    tracing::info!(
        duration_secs,
        audio_codec = %config.audio_codec,
        "Narration muxed"
    );

    Ok(Muxed {
        artifact: Artifact::new(output, video.info.with_duration(duration_secs)),
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeEngine;
    use newsreel_media_model::media::MediaInfo;

    fn video(path: &Path, secs: f64) -> Artifact {
        Artifact::new(path, MediaInfo::new(path, 1920, 1080, secs, 30.0).unwrap())
    }

    #[test]
    fn test_matching_durations_have_no_warning() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new();
        let v = video(&dir.path().join("overlaid.mp4"), 118.0);
        let out = dir.path().join("final.mp4");

        let muxed = mux(&engine, &PipelineConfig::default(), &v, Path::new("news.mp3"), 118.02, &out)
            .unwrap();
        assert!(muxed.warning.is_none());
        assert_eq!(muxed.artifact.path, out);

        let inv = &engine.invocations_for(Stage::Mux)[0];
        assert_eq!(inv.inputs[1], Path::new("news.mp3"));
        assert_eq!(inv.arg_value("-c:v"), Some("copy"));
        assert_eq!(inv.arg_value("-c:a"), Some("aac"));
        assert_eq!(inv.arg_value("-t"), Some("118.000000"));
    }

    #[test]
    fn test_mismatch_is_a_warning_and_uses_shorter_duration() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new();
        let v = video(&dir.path().join("overlaid.mp4"), 60.0);

        let muxed = mux(
            &engine,
            &PipelineConfig::default(),
            &v,
            Path::new("news.mp3"),
            58.0,
            &dir.path().join("final.mp4"),
        )
        .unwrap();

        assert!(matches!(
            muxed.warning,
            Some(NewsreelError::DurationMismatch { video_secs, audio_secs, .. })
                if video_secs == 60.0 && audio_secs == 58.0
        ));
        assert!(muxed.warning.as_ref().is_some_and(NewsreelError::is_soft));
        assert_eq!(muxed.artifact.info.duration_secs, 58.0);
        assert_eq!(
            engine.invocations_for(Stage::Mux)[0].arg_value("-t"),
            Some("58.000000")
        );
    }

    #[test]
    fn test_explicit_tolerance_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            duration_tolerance_secs: Some(1.0),
            ..PipelineConfig::default()
        };
        let v = video(&dir.path().join("v.mp4"), 60.0);
        let muxed = mux(
            &FakeEngine::new(),
            &config,
            &v,
            Path::new("news.mp3"),
            59.5,
            &dir.path().join("final.mp4"),
        )
        .unwrap();
        assert!(muxed.warning.is_none());
    }

    #[test]
    fn test_mux_failure_is_stage_failure() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new().fail_stage(Stage::Mux, 1);
        let v = video(&dir.path().join("v.mp4"), 10.0);
        let err = mux(
            &engine,
            &PipelineConfig::default(),
            &v,
            Path::new("news.mp3"),
            10.0,
            &dir.path().join("final.mp4"),
        )
        .unwrap_err();
        assert!(matches!(err, NewsreelError::StageFailed { ref stage, .. } if stage == "mux"));
    }
}
