//! Error types shared across Newsreel crates.

use std::path::{Path, PathBuf};

/// Top-level error type for Newsreel operations.
#[derive(Debug, thiserror::Error)]
pub enum NewsreelError {
    #[error("Media unreadable: {path}: {reason}")]
    MediaUnreadable { path: PathBuf, reason: String },

    #[error("No clips available to assemble")]
    NoClipsAvailable,

    #[error("Normalization failed for clip {clip} (status {status}): {stderr}")]
    NormalizationFailed {
        clip: PathBuf,
        status: String,
        stderr: String,
    },

    #[error(
        "Duration mismatch: video {video_secs:.3}s vs audio {audio_secs:.3}s (tolerance {tolerance_secs:.3}s)"
    )]
    DurationMismatch {
        video_secs: f64,
        audio_secs: f64,
        tolerance_secs: f64,
    },

    #[error("Missing asset: {path}")]
    MissingAsset { path: PathBuf },

    #[error("PIP composition failed at {step} for [{}] (status {status}): {stderr}", join_paths(.inputs))]
    PipCompositionFailed {
        step: String,
        inputs: Vec<PathBuf>,
        status: String,
        stderr: String,
    },

    #[error("External tool timed out after {timeout_secs:.1}s during {stage} for [{}]", join_paths(.inputs))]
    ExternalToolTimeout {
        stage: String,
        timeout_secs: f64,
        inputs: Vec<PathBuf>,
    },

    #[error("{stage} failed for [{}] (status {status}): {stderr}", join_paths(.inputs))]
    StageFailed {
        stage: String,
        inputs: Vec<PathBuf>,
        status: String,
        stderr: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using NewsreelError.
pub type NewsreelResult<T> = Result<T, NewsreelError>;

impl NewsreelError {
    pub fn media_unreadable(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::MediaUnreadable {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn missing_asset(path: impl AsRef<Path>) -> Self {
        Self::MissingAsset {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error is the soft duration warning rather than a failure.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::DurationMismatch { .. })
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failure_names_stage_inputs_and_status() {
        let err = NewsreelError::StageFailed {
            stage: "assemble".to_string(),
            inputs: vec![PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/b.mp4")],
            status: "exit status: 1".to_string(),
            stderr: "Invalid argument".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("assemble failed"));
        assert!(msg.contains("/tmp/a.mp4, /tmp/b.mp4"));
        assert!(msg.contains("exit status: 1"));
        assert!(msg.contains("Invalid argument"));
    }

    #[test]
    fn test_only_duration_mismatch_is_soft() {
        let soft = NewsreelError::DurationMismatch {
            video_secs: 10.0,
            audio_secs: 9.0,
            tolerance_secs: 0.04,
        };
        assert!(soft.is_soft());
        assert!(!NewsreelError::NoClipsAvailable.is_soft());
        assert!(!NewsreelError::missing_asset("/tmp/x.mp4").is_soft());
    }

    #[test]
    fn test_timeout_display() {
        let err = NewsreelError::ExternalToolTimeout {
            stage: "normalize".to_string(),
            timeout_secs: 2.5,
            inputs: vec![PathBuf::from("clip.mp4")],
        };
        assert_eq!(
            err.to_string(),
            "External tool timed out after 2.5s during normalize for [clip.mp4]"
        );
    }

    #[test]
    fn test_io_errors_convert() {
        fn fails() -> NewsreelResult<()> {
            let write: Result<(), std::io::Error> = Err(std::io::Error::other("disk full"));
            write?;
            Ok(())
        }
        assert!(matches!(fails(), Err(NewsreelError::Io(_))));
    }
}
