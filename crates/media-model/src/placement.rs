//! Picture-in-picture geometry.
//!
//! All coordinates are integer pixels in the main frame, origin top-left.

use std::fmt;
use std::str::FromStr;

use newsreel_common::error::{NewsreelError, NewsreelResult};
use serde::{Deserialize, Serialize};

/// Screen corner that anchors the PIP box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// Canonical, case-sensitive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Corner::TopLeft => "top-left",
            Corner::TopRight => "top-right",
            Corner::BottomLeft => "bottom-left",
            Corner::BottomRight => "bottom-right",
        }
    }

    /// Resolve a corner name, substituting `bottom-right` for anything
    /// unrecognized. The flag is `true` when the fallback was taken.
    pub fn resolve(name: &str) -> (Corner, bool) {
        match name.parse::<Corner>() {
            Ok(corner) => (corner, false),
            Err(_) => (Corner::default(), true),
        }
    }
}

impl FromStr for Corner {
    type Err = NewsreelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Corner::ALL
            .into_iter()
            .find(|corner| corner.as_str() == s)
            .ok_or_else(|| {
                NewsreelError::invalid_input(format!(
                    "unknown corner '{s}' (expected top-left, top-right, bottom-left or bottom-right)"
                ))
            })
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position and size of the PIP box inside the main frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipPlacement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Height that keeps the PIP source aspect ratio at `target_width`.
pub fn pip_height_for(target_width: u32, pip_width: u32, pip_height: u32) -> u32 {
    let source_aspect = pip_width as f64 / pip_height as f64;
    (target_width as f64 / source_aspect).round() as u32
}

impl PipPlacement {
    /// Compute the PIP box for a main frame of `main_width x main_height`.
    ///
    /// The height is always derived from the PIP source (`pip_width x
    /// pip_height`). Fails when any dimension is zero or when the box plus
    /// `padding` does not fit inside the main frame.
    pub fn compute(
        main_width: u32,
        main_height: u32,
        pip_width: u32,
        pip_height: u32,
        target_width: u32,
        padding: u32,
        corner: Corner,
    ) -> NewsreelResult<Self> {
        if main_width == 0 || main_height == 0 {
            return Err(NewsreelError::invalid_input(format!(
                "main frame has invalid size {main_width}x{main_height}"
            )));
        }
        if pip_width == 0 || pip_height == 0 {
            return Err(NewsreelError::invalid_input(format!(
                "PIP source has invalid size {pip_width}x{pip_height}"
            )));
        }
        if target_width == 0 {
            return Err(NewsreelError::invalid_input("PIP width must be positive"));
        }

        let width = target_width;
        let height = pip_height_for(target_width, pip_width, pip_height);
        if height == 0 {
            return Err(NewsreelError::invalid_input(format!(
                "PIP width {target_width} yields zero height for a {pip_width}x{pip_height} source"
            )));
        }

        let fits_x = width.checked_add(padding).is_some_and(|w| w <= main_width);
        let fits_y = height.checked_add(padding).is_some_and(|h| h <= main_height);
        if !fits_x || !fits_y {
            return Err(NewsreelError::invalid_input(format!(
                "PIP box {width}x{height} with {padding}px padding does not fit a {main_width}x{main_height} frame"
            )));
        }

        let right = main_width - width - padding;
        let bottom = main_height - height - padding;
        let (x, y) = match corner {
            Corner::TopLeft => (padding, padding),
            Corner::TopRight => (right, padding),
            Corner::BottomLeft => (padding, bottom),
            Corner::BottomRight => (right, bottom),
        };

        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}
