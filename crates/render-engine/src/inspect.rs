//! Media inspection through the engine's probe.

use std::path::Path;

use newsreel_common::error::{NewsreelError, NewsreelResult};
use newsreel_common::timing::{parse_rate, DEFAULT_FRAME_RATE};
use newsreel_media_model::media::{Clip, MediaInfo};

use crate::engine::{MediaEngine, ProbeReport, Stage};

/// Probe `path` and describe its first video stream.
///
/// Duration comes from the video stream, falling back to the container.
/// The frame rate falls back to [`DEFAULT_FRAME_RATE`] when the stream
/// reports none.
pub fn inspect(engine: &dyn MediaEngine, path: &Path) -> NewsreelResult<MediaInfo> {
    if !path.is_file() {
        return Err(NewsreelError::media_unreadable(path, "file does not exist"));
    }

    let report = probe(engine, path)?;
    let info = media_info_from_probe(path, &report)?;
    tracing::debug!(
        path = %path.display(),
        width = info.width,
        height = info.height,
        duration_secs = info.duration_secs,
        fps = info.frame_rate,
        "Inspected media"
    );
    Ok(info)
}

/// Inspect `path` and pair it with its info.
pub fn inspect_clip(engine: &dyn MediaEngine, path: &Path) -> NewsreelResult<Clip> {
    Ok(Clip::new(path, inspect(engine, path)?))
}

/// Duration of any media file (used for the narration track).
pub fn probe_duration(engine: &dyn MediaEngine, path: &Path) -> NewsreelResult<f64> {
    if !path.is_file() {
        return Err(NewsreelError::media_unreadable(path, "file does not exist"));
    }

    let report = probe(engine, path)?;
    report
        .format_duration()
        .or_else(|| report.streams.iter().find_map(|s| s.duration_secs()))
        .ok_or_else(|| NewsreelError::media_unreadable(path, "no duration reported"))
}

fn probe(engine: &dyn MediaEngine, path: &Path) -> NewsreelResult<ProbeReport> {
    engine
        .probe(path)
        .map_err(|failure| failure.into_error(Stage::Probe, &[path.to_path_buf()]))
}

/// Build a [`MediaInfo`] from a parsed probe report.
pub fn media_info_from_probe(path: &Path, report: &ProbeReport) -> NewsreelResult<MediaInfo> {
    let stream = report
        .video_stream()
        .ok_or_else(|| NewsreelError::media_unreadable(path, "no video stream found"))?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);

    let duration_secs = stream
        .duration_secs()
        .or_else(|| report.format_duration())
        .ok_or_else(|| NewsreelError::media_unreadable(path, "no duration reported"))?;

    let frame_rate = [&stream.r_frame_rate, &stream.avg_frame_rate]
        .into_iter()
        .filter_map(|rate| rate.as_deref().and_then(parse_rate))
        .next()
        .unwrap_or(DEFAULT_FRAME_RATE);

    MediaInfo::new(path, width, height, duration_secs, frame_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ProbeFormat, ProbeStream};
    use crate::fake::FakeEngine;

    fn video_stream() -> ProbeStream {
        ProbeStream {
            codec_type: Some("video".to_string()),
            width: Some(1280),
            height: Some(720),
            r_frame_rate: Some("25/1".to_string()),
            avg_frame_rate: Some("25/1".to_string()),
            duration: Some("8.000000".to_string()),
        }
    }

    #[test]
    fn test_stream_duration_wins_over_container() {
        let report = ProbeReport {
            streams: vec![video_stream()],
            format: Some(ProbeFormat {
                format_name: None,
                duration: Some("8.040000".to_string()),
            }),
        };
        let info = media_info_from_probe(Path::new("a.mp4"), &report).unwrap();
        assert_eq!(info.duration_secs, 8.0);
        assert_eq!(info.frame_rate, 25.0);
    }

    #[test]
    fn test_container_duration_fallback() {
        let mut stream = video_stream();
        stream.duration = None;
        let report = ProbeReport {
            streams: vec![stream],
            format: Some(ProbeFormat {
                format_name: None,
                duration: Some("9.5".to_string()),
            }),
        };
        let info = media_info_from_probe(Path::new("a.mkv"), &report).unwrap();
        assert_eq!(info.duration_secs, 9.5);
    }

    #[test]
    fn test_missing_frame_rate_defaults_to_thirty() {
        let mut stream = video_stream();
        stream.r_frame_rate = Some("0/0".to_string());
        stream.avg_frame_rate = None;
        let report = ProbeReport {
            streams: vec![stream],
            format: None,
        };
        let info = media_info_from_probe(Path::new("a.avi"), &report).unwrap();
        assert_eq!(info.frame_rate, DEFAULT_FRAME_RATE);
    }

    #[test]
    fn test_avg_frame_rate_used_when_r_frame_rate_invalid() {
        let mut stream = video_stream();
        stream.r_frame_rate = Some("0/0".to_string());
        stream.avg_frame_rate = Some("30000/1001".to_string());
        let report = ProbeReport {
            streams: vec![stream],
            format: None,
        };
        let info = media_info_from_probe(Path::new("a.mov"), &report).unwrap();
        assert!((info.frame_rate - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_unusable_reports_are_unreadable() {
        let path = Path::new("song.mp3");
        let audio_only = ProbeReport::audio(30.0);
        assert!(matches!(
            media_info_from_probe(path, &audio_only),
            Err(NewsreelError::MediaUnreadable { .. })
        ));

        let mut zero = video_stream();
        zero.width = Some(0);
        let report = ProbeReport {
            streams: vec![zero],
            format: None,
        };
        assert!(media_info_from_probe(path, &report).is_err());

        let mut no_duration = video_stream();
        no_duration.duration = Some("N/A".to_string());
        let report = ProbeReport {
            streams: vec![no_duration],
            format: None,
        };
        assert!(media_info_from_probe(path, &report).is_err());
    }

    #[test]
    fn test_inspect_missing_file_never_probes() {
        let engine = FakeEngine::new();
        let err = inspect(&engine, Path::new("/definitely/not/here.mp4")).unwrap_err();
        assert!(matches!(err, NewsreelError::MediaUnreadable { .. }));
        assert!(engine.probed().is_empty());
    }

    #[test]
    fn test_inspect_and_probe_duration_through_engine() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        let audio = dir.path().join("news.mp3");
        std::fs::write(&clip, b"").unwrap();
        std::fs::write(&audio, b"").unwrap();

        let engine = FakeEngine::new()
            .with_probe(&clip, ProbeReport::video(1920, 1080, 12.0, 30.0))
            .with_probe(&audio, ProbeReport::audio(118.0));

        let info = inspect(&engine, &clip).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.frame_rate, 30.0);
        assert_eq!(probe_duration(&engine, &audio).unwrap(), 118.0);
    }

    #[test]
    fn test_probe_failure_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("garbage.mp4");
        std::fs::write(&clip, b"not a video").unwrap();

        let err = inspect(&FakeEngine::new(), &clip).unwrap_err();
        match err {
            NewsreelError::MediaUnreadable { path, .. } => assert_eq!(path, clip),
            other => panic!("unexpected error: {other}"),
        }
    }
}
