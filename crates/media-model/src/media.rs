//! Media descriptors that flow between pipeline stages.

use std::path::{Path, PathBuf};

use newsreel_common::error::{NewsreelError, NewsreelResult};
use serde::{Deserialize, Serialize};

/// Intrinsic properties of a video file.
///
/// Only constructed through [`MediaInfo::new`], which rejects zero
/// dimensions, non-positive frame rates and invalid durations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Frames per second.
    pub frame_rate: f64,
}

impl MediaInfo {
    /// Validate and build a media descriptor for `path`.
    pub fn new(
        path: &Path,
        width: u32,
        height: u32,
        duration_secs: f64,
        frame_rate: f64,
    ) -> NewsreelResult<Self> {
        if width == 0 || height == 0 {
            return Err(NewsreelError::media_unreadable(
                path,
                format!("invalid dimensions {width}x{height}"),
            ));
        }
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(NewsreelError::media_unreadable(
                path,
                format!("invalid duration {duration_secs}"),
            ));
        }
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(NewsreelError::media_unreadable(
                path,
                format!("invalid frame rate {frame_rate}"),
            ));
        }
        Ok(Self {
            width,
            height,
            duration_secs,
            frame_rate,
        })
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Same frame geometry, different duration.
    pub fn with_duration(self, duration_secs: f64) -> Self {
        Self {
            duration_secs,
            ..self
        }
    }
}

/// A single video file plus its measured properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub path: PathBuf,
    pub info: MediaInfo,
}

impl Clip {
    pub fn new(path: impl Into<PathBuf>, info: MediaInfo) -> Self {
        Self {
            path: path.into(),
            info,
        }
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.info.duration_secs
    }
}

/// A file produced by a pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub info: MediaInfo,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, info: MediaInfo) -> Self {
        Self {
            path: path.into(),
            info,
        }
    }

    /// The artifact seen as a clip, for stages that consume clips.
    pub fn as_clip(&self) -> Clip {
        Clip::new(self.path.clone(), self.info)
    }

    /// The same content moved to another path.
    pub fn relocated(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            info: self.info,
        }
    }
}
