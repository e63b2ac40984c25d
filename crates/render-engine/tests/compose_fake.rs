//! End-to-end composition runs against the recording engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use newsreel_common::config::{FillPolicy, PipelineConfig};
use newsreel_common::error::NewsreelError;
use newsreel_common::timing::within_one_frame;
use newsreel_media_model::job::{NewsJob, PipRequest, NARRATION_FILE, SCRIPT_FILE, VIDEOS_DIR};
use newsreel_render_engine::fake::FakeEngine;
use newsreel_render_engine::scratch::report_path;
use newsreel_render_engine::{NewsPipeline, ProbeReport, Stage};

/// Lay out a job directory with empty media files.
fn job_dir(root: &Path, clips: &[&str], narration: bool, script: Option<&str>) -> PathBuf {
    let dir = root.join("job");
    let videos = dir.join(VIDEOS_DIR);
    std::fs::create_dir_all(&videos).unwrap();
    for clip in clips {
        std::fs::write(videos.join(clip), b"").unwrap();
    }
    if narration {
        std::fs::write(dir.join(NARRATION_FILE), b"").unwrap();
    }
    if let Some(text) = script {
        std::fs::write(dir.join(SCRIPT_FILE), text).unwrap();
    }
    dir
}

#[test]
fn discovered_job_is_composed_in_file_name_order() {
    let root = tempfile::tempdir().unwrap();
    let dir = job_dir(
        root.path(),
        &["b_city.mov", "a_market.mp4", "c_port.mkv"],
        true,
        Some("Stocks climbed for a third day as investors weighed new data."),
    );
    let videos = dir.join(VIDEOS_DIR);

    let engine = Arc::new(
        FakeEngine::new()
            .with_probe(videos.join("a_market.mp4"), ProbeReport::video(1920, 1080, 50.0, 30.0))
            .with_probe(videos.join("b_city.mov"), ProbeReport::video(1280, 720, 50.0, 25.0))
            .with_probe(videos.join("c_port.mkv"), ProbeReport::video(640, 360, 50.0, 24.0))
            .with_probe(dir.join(NARRATION_FILE), ProbeReport::audio(118.0)),
    );

    let job = NewsJob::discover(&dir).unwrap();
    let output = root.path().join("render").join("news.mp4");
    let report = NewsPipeline::new(PipelineConfig::default(), engine.clone())
        .compose(&job, &output)
        .unwrap();

    let normalized_sources: Vec<PathBuf> = engine
        .invocations_for(Stage::Normalize)
        .iter()
        .map(|inv| inv.inputs[0].clone())
        .collect();
    assert_eq!(
        normalized_sources,
        vec![
            videos.join("a_market.mp4"),
            videos.join("b_city.mov"),
            videos.join("c_port.mkv"),
        ]
    );

    // 3 x 50 s against 118 s of narration: the third clip is cut to 18 s.
    assert_eq!(report.timeline.entries, 3);
    assert_eq!(report.timeline.trimmed, 1);
    let assemble = &engine.invocations_for(Stage::Assemble)[0];
    assert!(assemble
        .arg_value("-filter_complex")
        .unwrap()
        .contains("trim=duration=18.000000"));

    assert!(report.overlay_applied);
    assert!(output.is_file());
    assert!(report_path(&output).is_file());
}

#[test]
fn intro_and_hold_policy() {
    let root = tempfile::tempdir().unwrap();
    let dir = job_dir(root.path(), &["a.mp4"], true, None);
    let clip = dir.join(VIDEOS_DIR).join("a.mp4");
    let intro = root.path().join("intro.mp4");
    std::fs::write(&intro, b"").unwrap();

    let engine = Arc::new(
        FakeEngine::new()
            .with_probe(&clip, ProbeReport::video(1920, 1080, 10.0, 30.0))
            .with_probe(&intro, ProbeReport::video(1920, 1080, 4.0, 30.0))
            .with_probe(dir.join(NARRATION_FILE), ProbeReport::audio(20.0)),
    );
    let config = PipelineConfig {
        fill_policy: FillPolicy::Hold,
        ..PipelineConfig::default()
    };

    let job = NewsJob::discover(&dir).unwrap().with_intro(&intro);
    let report = NewsPipeline::new(config, engine.clone())
        .compose(&job, &root.path().join("news.mp4"))
        .unwrap();

    assert!(report.timeline.has_intro);
    assert_eq!(report.timeline.entries, 2);
    let graph = engine.invocations_for(Stage::Assemble)[0]
        .arg_value("-filter_complex")
        .unwrap()
        .to_string();
    assert!(graph.contains("tpad=stop_mode=clone:stop_duration=6.000000"));
    assert!(!report.overlay_applied);
}

#[test]
fn every_clip_failing_aborts_with_normalization_error() {
    let root = tempfile::tempdir().unwrap();
    let dir = job_dir(root.path(), &["a.mp4", "b.mp4"], false, None);
    let videos = dir.join(VIDEOS_DIR);
    let engine = Arc::new(
        FakeEngine::new()
            .with_probe(videos.join("a.mp4"), ProbeReport::video(1920, 1080, 10.0, 30.0))
            .with_probe(videos.join("b.mp4"), ProbeReport::video(1920, 1080, 10.0, 30.0))
            .fail_stage(Stage::Normalize, 1),
    );

    let output = root.path().join("news.mp4");
    let err = NewsPipeline::new(PipelineConfig::default(), engine.clone())
        .compose(&NewsJob::discover(&dir).unwrap(), &output)
        .unwrap_err();

    assert!(matches!(err, NewsreelError::NormalizationFailed { .. }));
    assert!(!output.exists());
    assert!(engine.invocations_for(Stage::Assemble).is_empty());
}

#[test]
fn engine_timeout_surfaces_stage_and_inputs() {
    let root = tempfile::tempdir().unwrap();
    let dir = job_dir(root.path(), &["a.mp4"], true, None);
    let clip = dir.join(VIDEOS_DIR).join("a.mp4");
    let engine = Arc::new(
        FakeEngine::new()
            .with_probe(&clip, ProbeReport::video(1920, 1080, 10.0, 30.0))
            .with_probe(dir.join(NARRATION_FILE), ProbeReport::audio(10.0))
            .time_out_stage(Stage::Mux),
    );

    let err = NewsPipeline::new(PipelineConfig::default(), engine)
        .compose(&NewsJob::discover(&dir).unwrap(), &root.path().join("news.mp4"))
        .unwrap_err();

    match err {
        NewsreelError::ExternalToolTimeout { stage, inputs, .. } => {
            assert_eq!(stage, "mux");
            assert_eq!(inputs.len(), 2);
            assert_eq!(inputs[1], dir.join(NARRATION_FILE));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn pip_with_unknown_corner_falls_back_to_bottom_right() {
    let root = tempfile::tempdir().unwrap();
    let dir = job_dir(root.path(), &["a.mp4"], false, None);
    let clip = dir.join(VIDEOS_DIR).join("a.mp4");
    let anchor = root.path().join("anchor.mp4");
    std::fs::write(&anchor, b"").unwrap();

    let engine = Arc::new(
        FakeEngine::new()
            .with_probe(&clip, ProbeReport::video(1280, 720, 10.0, 30.0))
            .with_probe(&anchor, ProbeReport::video(640, 480, 5.0, 30.0)),
    );

    let job = NewsJob::discover(&dir)
        .unwrap()
        .with_pip(PipRequest::new(&anchor, 256, "middle"));
    let report = NewsPipeline::new(PipelineConfig::default(), engine.clone())
        .compose(&job, &root.path().join("news.mp4"))
        .unwrap();

    assert!(report.pip.is_some());
    let graph = engine.invocations_for(Stage::PipOverlay)[0]
        .arg_value("-filter_complex")
        .unwrap()
        .to_string();
    // 1920x1080 output frame, 256x192 box, 20 px padding.
    assert!(graph.contains("overlay=x=1644:y=868"));
}

#[test]
fn produced_video_is_measured_and_matches_narration() {
    let root = tempfile::tempdir().unwrap();
    let dir = job_dir(root.path(), &["a.mp4", "b.mp4"], true, Some("Rain expected tonight."));
    let videos = dir.join(VIDEOS_DIR);
    let engine = Arc::new(
        FakeEngine::new()
            .with_probe(videos.join("a.mp4"), ProbeReport::video(1920, 1080, 10.0, 29.97))
            .with_probe(videos.join("b.mp4"), ProbeReport::video(1280, 720, 7.0, 25.0))
            .with_probe(dir.join(NARRATION_FILE), ProbeReport::audio(118.0)),
    );

    let report = NewsPipeline::new(PipelineConfig::default(), engine.clone())
        .compose(&NewsJob::discover(&dir).unwrap(), &root.path().join("news.mp4"))
        .unwrap();

    assert!(within_one_frame(report.output.info.duration_secs, 118.0, 30.0));
    assert!(report.warnings.is_empty());

    // Sources, narration, two normalized clips, the base and the overlaid video.
    let probed = engine.probed();
    assert_eq!(probed.len(), 7);
    for name in ["clip_000.mp4", "clip_001.mp4", "base.mp4", "overlaid.mp4"] {
        assert!(probed.iter().any(|p| p.ends_with(name)), "{name} was not probed");
    }

    let graph = engine.invocations_for(Stage::Assemble)[0]
        .arg_value("-filter_complex")
        .unwrap()
        .to_string();
    assert!(graph.contains("concat=n="));
    assert!(graph.contains(",tpad=stop_mode=clone:stop_duration=0.033333,format=yuv420p[vout]"));
}

#[test]
fn short_assembly_is_reported_as_duration_mismatch() {
    let root = tempfile::tempdir().unwrap();
    let dir = job_dir(root.path(), &["a.mp4"], true, Some("Markets closed higher."));
    let engine = Arc::new(
        FakeEngine::new()
            .with_probe(dir.join(VIDEOS_DIR).join("a.mp4"), ProbeReport::video(1920, 1080, 10.0, 29.97))
            .with_probe(dir.join(NARRATION_FILE), ProbeReport::audio(118.0))
            .with_stage_output(Stage::Assemble, ProbeReport::video(1920, 1080, 117.5, 30.0)),
    );

    let report = NewsPipeline::new(PipelineConfig::default(), engine.clone())
        .compose(&NewsJob::discover(&dir).unwrap(), &root.path().join("news.mp4"))
        .unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("Duration mismatch"));
    assert_eq!(report.output.info.duration_secs, 117.5);
    assert_eq!(
        engine.invocations_for(Stage::Mux)[0].arg_value("-t"),
        Some("117.500000")
    );
}

#[test]
fn script_with_drawtext_metacharacters_is_drawn_literally() {
    let root = tempfile::tempdir().unwrap();
    let dir = job_dir(
        root.path(),
        &["a.mp4"],
        false,
        Some(r"Stocks rose 5% after the C:\ report; {n} %{pts}"),
    );
    let engine = Arc::new(
        FakeEngine::new()
            .with_probe(dir.join(VIDEOS_DIR).join("a.mp4"), ProbeReport::video(1920, 1080, 10.0, 30.0)),
    );

    let report = NewsPipeline::new(PipelineConfig::default(), engine.clone())
        .compose(&NewsJob::discover(&dir).unwrap(), &root.path().join("news.mp4"))
        .unwrap();

    assert!(report.overlay_applied);
    let filter = engine.invocations_for(Stage::Overlay)[0]
        .arg_value("-vf")
        .unwrap()
        .to_string();
    assert!(filter.contains(":expansion=none:"));
    assert!(!filter.contains("5%"));
    assert!(!filter.contains("{n}"));
}
