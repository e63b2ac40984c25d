//! Scrolling text overlay geometry.
//!
//! The overlay is one continuous vertical crawl of word-wrapped text,
//! horizontally centered. Its speed is chosen so the crawl covers the whole
//! video: the text is already entering the frame at `t = 0` and its last
//! line leaves the frame exactly at the end.

use newsreel_common::config::{OverlayPosition, OverlayStyle};
use serde::{Deserialize, Serialize};

/// Average glyph width as a fraction of the font size.
const GLYPH_WIDTH_FACTOR: f64 = 0.6;

/// Line pitch as a multiple of the font size, used for the block height.
const LINE_HEIGHT_FACTOR: f64 = 1.5;

/// Fully derived parameters of the scrolling text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySpec {
    /// Wrapped text, one output line per `\n`.
    pub text: String,
    pub position: OverlayPosition,
    /// Crawl speed in pixels per second.
    pub scroll_speed: f64,
    pub line_count: usize,
    /// Estimated height of the whole text block in pixels.
    pub block_height: f64,
    pub frame_height: u32,
    pub duration_secs: f64,
}

impl OverlaySpec {
    /// Derive the overlay for a `frame_width x frame_height` video lasting
    /// `duration_secs`. Returns `None` when the script has no visible text or
    /// the duration is not positive.
    pub fn derive(
        script: &str,
        frame_width: u32,
        frame_height: u32,
        duration_secs: f64,
        style: &OverlayStyle,
    ) -> Option<Self> {
        if script.trim().is_empty() || !(duration_secs > 0.0) {
            return None;
        }

        let width = chars_per_line(frame_width, style);
        let lines = wrap_text(script.trim_end(), width);
        let line_count = lines.len();
        let block_height = line_count as f64 * style.font_size as f64 * LINE_HEIGHT_FACTOR;

        let travel = match style.position {
            OverlayPosition::Bottom | OverlayPosition::Top => frame_height as f64 + block_height,
            OverlayPosition::Custom { y } => y as f64 + block_height,
        };

        Some(Self {
            text: lines.join("\n"),
            position: style.position,
            scroll_speed: travel / duration_secs,
            line_count,
            block_height,
            frame_height,
            duration_secs,
        })
    }

    /// Top edge of the text block at time `t` (seconds).
    pub fn y_at(&self, t: f64) -> f64 {
        match self.position {
            OverlayPosition::Bottom => self.frame_height as f64 - self.scroll_speed * t,
            OverlayPosition::Top => -self.block_height + self.scroll_speed * t,
            OverlayPosition::Custom { y } => y as f64 - self.scroll_speed * t,
        }
    }

    /// The drawtext `y` expression matching [`OverlaySpec::y_at`].
    pub fn y_expr(&self) -> String {
        match self.position {
            OverlayPosition::Bottom => format!("h-{:.6}*t", self.scroll_speed),
            OverlayPosition::Top => {
                format!("-{:.6}+{:.6}*t", self.block_height, self.scroll_speed)
            }
            OverlayPosition::Custom { y } => format!("{y}-{:.6}*t", self.scroll_speed),
        }
    }
}

/// Characters that fit on one line of the text column.
pub fn chars_per_line(frame_width: u32, style: &OverlayStyle) -> usize {
    let column = frame_width as f64 * style.text_width_ratio;
    let glyph = style.font_size.max(1) as f64 * GLYPH_WIDTH_FACTOR;
    ((column / glyph).floor() as usize).max(1)
}

/// Greedy word wrap. Paragraph breaks are kept, words longer than `width`
/// are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_len = 0usize;

        for word in paragraph.split_whitespace() {
            let chars: Vec<char> = word.chars().collect();
            let mut rest: &[char] = &chars;

            while !rest.is_empty() {
                let sep = usize::from(line_len > 0);
                if line_len + sep + rest.len() <= width {
                    if sep == 1 {
                        line.push(' ');
                    }
                    line.extend(rest.iter());
                    line_len += sep + rest.len();
                    rest = &[];
                } else if line_len > 0 {
                    out.push(std::mem::take(&mut line));
                    line_len = 0;
                } else {
                    let (head, tail) = rest.split_at(width);
                    out.push(head.iter().collect());
                    rest = tail;
                }
            }
        }

        out.push(line);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(position: OverlayPosition) -> OverlayStyle {
        OverlayStyle {
            position,
            ..OverlayStyle::default()
        }
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 10);
        assert_eq!(
            lines,
            vec!["the quick", "brown fox", "jumps over", "the lazy", "dog"]
        );
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
    }

    #[test]
    fn test_wrap_keeps_paragraphs_and_splits_long_words() {
        let lines = wrap_text("first\n\nabcdefghijkl end", 5);
        assert_eq!(lines, vec!["first", "", "abcde", "fghij", "kl", "end"]);
    }

    #[test]
    fn test_wrap_never_drops_text() {
        let text = "Breaking: markets rally as central banks signal rate cuts across major economies";
        let lines = wrap_text(text, 17);
        let rejoined = lines.join(" ");
        assert_eq!(
            rejoined.split_whitespace().collect::<Vec<_>>(),
            text.split_whitespace().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_chars_per_line_uses_seventy_percent_column() {
        // 1920 * 0.7 / (36 * 0.6) = 62.2
        assert_eq!(chars_per_line(1920, &OverlayStyle::default()), 62);
    }

    #[test]
    fn test_empty_script_has_no_overlay() {
        assert!(OverlaySpec::derive("  \n ", 1920, 1080, 30.0, &OverlayStyle::default()).is_none());
        assert!(OverlaySpec::derive("text", 1920, 1080, 0.0, &OverlayStyle::default()).is_none());
    }

    #[test]
    fn test_bottom_crawl_spans_full_duration() {
        let spec = OverlaySpec::derive(
            "one two three",
            1920,
            1080,
            120.0,
            &style(OverlayPosition::Bottom),
        )
        .unwrap();
        assert_eq!(spec.line_count, 1);
        assert!((spec.block_height - 54.0).abs() < 1e-9);
        // Starts just under the bottom edge, ends just above the top edge.
        assert!((spec.y_at(0.0) - 1080.0).abs() < 1e-9);
        assert!((spec.y_at(120.0) + spec.block_height).abs() < 1e-6);
        assert_eq!(spec.y_expr(), format!("h-{:.6}*t", (1080.0 + 54.0) / 120.0));
    }

    #[test]
    fn test_top_crawl_moves_down() {
        let spec =
            OverlaySpec::derive("news", 1280, 720, 10.0, &style(OverlayPosition::Top)).unwrap();
        assert!((spec.y_at(0.0) + spec.block_height).abs() < 1e-9);
        assert!((spec.y_at(10.0) - 720.0).abs() < 1e-6);
        assert!(spec.y_expr().starts_with("-54.000000+"));
    }

    #[test]
    fn test_custom_crawl_starts_at_offset() {
        let spec = OverlaySpec::derive(
            "news",
            1280,
            720,
            10.0,
            &style(OverlayPosition::Custom { y: 400 }),
        )
        .unwrap();
        assert!((spec.y_at(0.0) - 400.0).abs() < 1e-9);
        assert!((spec.y_at(10.0) + spec.block_height).abs() < 1e-6);
        assert!(spec.y_expr().starts_with("400-"));
    }

    #[test]
    fn test_longer_text_scrolls_faster() {
        let short = OverlaySpec::derive("a b c", 1920, 1080, 60.0, &OverlayStyle::default()).unwrap();
        let long_text = "word ".repeat(400);
        let long = OverlaySpec::derive(&long_text, 1920, 1080, 60.0, &OverlayStyle::default()).unwrap();
        assert!(long.line_count > short.line_count);
        assert!(long.scroll_speed > short.scroll_speed);
    }
}
