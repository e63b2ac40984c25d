//! The inputs of one composition run.
//!
//! A job is the set of files produced by the upstream collaborators (stock
//! footage downloader, text-to-speech, script writer). It can be built by
//! hand or discovered from a job directory:
//!
//! ```text
//! job/
//! ├── videos/      stock clips (*.mp4, *.mov, *.avi, *.mkv)
//! ├── news.mp3     narration (optional)
//! └── script.txt   overlay text (optional)
//! ```

use std::path::{Path, PathBuf};

use newsreel_common::error::{NewsreelError, NewsreelResult};
use serde::{Deserialize, Serialize};

/// Clip container extensions picked up by [`NewsJob::discover`].
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "mkv"];

pub const VIDEOS_DIR: &str = "videos";
pub const NARRATION_FILE: &str = "news.mp3";
pub const SCRIPT_FILE: &str = "script.txt";

/// A talking-head overlay request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipRequest {
    pub path: PathBuf,
    /// Target PIP width in pixels.
    pub width: u32,
    /// Corner name as supplied by the caller. Resolved leniently at
    /// composition time.
    pub corner: String,
}

impl PipRequest {
    pub fn new(path: impl Into<PathBuf>, width: u32, corner: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            width,
            corner: corner.into(),
        }
    }
}

/// Everything one run consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsJob {
    /// Stock clips in play order.
    pub clips: Vec<PathBuf>,
    /// Played once before the clips.
    #[serde(default)]
    pub intro: Option<PathBuf>,
    /// Narration audio; drives the target duration.
    #[serde(default)]
    pub audio: Option<PathBuf>,
    /// Overlay text.
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub pip: Option<PipRequest>,
}

impl NewsJob {
    pub fn new(clips: Vec<PathBuf>) -> Self {
        Self {
            clips,
            ..Self::default()
        }
    }

    pub fn with_intro(mut self, intro: impl Into<PathBuf>) -> Self {
        self.intro = Some(intro.into());
        self
    }

    pub fn with_audio(mut self, audio: impl Into<PathBuf>) -> Self {
        self.audio = Some(audio.into());
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_pip(mut self, pip: PipRequest) -> Self {
        self.pip = Some(pip);
        self
    }

    /// Build a job from a job directory.
    ///
    /// Clips are sorted by file name. A missing `videos/` directory yields a
    /// job without clips; the pipeline reports that as `NoClipsAvailable`.
    pub fn discover(dir: &Path) -> NewsreelResult<Self> {
        if !dir.is_dir() {
            return Err(NewsreelError::missing_asset(dir));
        }

        let videos = dir.join(VIDEOS_DIR);
        let mut clips = Vec::new();
        if videos.is_dir() {
            for entry in std::fs::read_dir(&videos)? {
                let path = entry?.path();
                if path.is_file() && is_video_file(&path) {
                    clips.push(path);
                }
            }
        }
        clips.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let audio = Some(dir.join(NARRATION_FILE)).filter(|p| p.is_file());

        let script_path = dir.join(SCRIPT_FILE);
        let script = if script_path.is_file() {
            Some(std::fs::read_to_string(&script_path)?)
        } else {
            None
        };

        Ok(Self {
            clips,
            intro: None,
            audio,
            script,
            pip: None,
        })
    }

    /// Human-readable descriptions of referenced files that do not exist.
    pub fn missing_sources(&self) -> Vec<String> {
        let mut missing = vec![];

        let mut check = |path: &Path, label: &str| {
            if !path.exists() {
                missing.push(format!("{label} missing: {}", path.display()));
            }
        };

        for clip in &self.clips {
            check(clip, "Clip");
        }
        if let Some(intro) = &self.intro {
            check(intro, "Intro");
        }
        if let Some(audio) = &self.audio {
            check(audio, "Narration");
        }
        if let Some(pip) = &self.pip {
            check(&pip.path, "PIP source");
        }

        missing
    }

    /// First referenced file that does not exist, as a `MissingAsset` error.
    pub fn validate_sources(&self) -> NewsreelResult<()> {
        let all = self
            .clips
            .iter()
            .chain(self.intro.iter())
            .chain(self.audio.iter())
            .chain(self.pip.iter().map(|p| &p.path));

        for path in all {
            if !path.exists() {
                return Err(NewsreelError::missing_asset(path));
            }
        }
        Ok(())
    }

    /// Script text when it has anything visible.
    pub fn visible_script(&self) -> Option<&str> {
        self.script.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Whether `path` has one of [`VIDEO_EXTENSIONS`], ignoring case.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}
