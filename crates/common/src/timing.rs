//! Frame timing utilities for duration reconciliation.
//!
//! Durations travel through the pipeline as seconds (`f64`). These helpers
//! measure drift between the visual and audio streams in frames.

/// Fallback frame rate when a probe cannot determine one.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Duration of a single frame in seconds.
pub fn frame_duration_secs(fps: f64) -> f64 {
    if fps > 0.0 {
        1.0 / fps
    } else {
        1.0 / DEFAULT_FRAME_RATE
    }
}

/// Whether two durations agree within one frame at `fps`.
pub fn within_one_frame(a_secs: f64, b_secs: f64, fps: f64) -> bool {
    (a_secs - b_secs).abs() <= frame_duration_secs(fps) + 1e-9
}

/// Parse an ffmpeg rational such as `30000/1001` or a plain number.
/// Returns `None` for zero, negative or malformed values.
pub fn parse_rate(s: &str) -> Option<f64> {
    let value = match s.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.trim().parse::<f64>().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Drift measurement between the assembled video and the narration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationDrift {
    /// Visual stream duration (seconds).
    pub video_secs: f64,
    /// Audio stream duration (seconds).
    pub audio_secs: f64,
}

impl DurationDrift {
    /// Drift in seconds (positive = video is longer).
    pub fn drift_secs(&self) -> f64 {
        self.video_secs - self.audio_secs
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds(&self, tolerance_secs: f64) -> bool {
        self.drift_secs().abs() > tolerance_secs + 1e-9
    }

    /// Duration both streams can cover.
    pub fn shorter_secs(&self) -> f64 {
        self.video_secs.min(self.audio_secs)
    }
}

/// Format seconds for ffmpeg `-t`/`trim` arguments.
pub fn format_secs(secs: f64) -> String {
    format!("{:.6}", secs.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_duration() {
        assert!((frame_duration_secs(25.0) - 0.04).abs() < 1e-12);
        assert!((frame_duration_secs(0.0) - 1.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_within_one_frame() {
        assert!(within_one_frame(118.0, 118.03, 30.0));
        assert!(!within_one_frame(118.0, 118.1, 30.0));
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("30/1"), Some(30.0));
        assert!((parse_rate("30000/1001").unwrap() - 29.97).abs() < 0.001);
        assert_eq!(parse_rate("25"), Some(25.0));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("0/1"), None);
        assert_eq!(parse_rate("abc"), None);
    }

    #[test]
    fn test_duration_drift() {
        let drift = DurationDrift {
            video_secs: 120.0,
            audio_secs: 118.0,
        };
        assert!((drift.drift_secs() - 2.0).abs() < 1e-12);
        assert!(drift.exceeds(1.0 / 30.0));
        assert!(!drift.exceeds(5.0));
        assert!((drift.shorter_secs() - 118.0).abs() < 1e-12);
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(118.0), "118.000000");
        assert_eq!(format_secs(-1.0), "0.000000");
    }
}
