//! Newsreel Render Engine
//!
//! Composes a finished news video from stock clips, a narration track, a
//! script and an optional talking head. Every pixel operation is delegated
//! to an external media engine (ffmpeg) through [`engine::MediaEngine`].
//!
//! # Pipeline Architecture
//!
//! ```text
//! clips/*.mp4 ── Inspect ── Normalize (scale/pad, fps, yuv420p, bt709)
//!                                 │
//! intro.mp4 ──────────────────────┤
//!                                 ▼
//! news.mp3 ── duration ──► Assemble (loop / trim to narration length)
//!                                 │
//! script.txt ─────────────► Text Overlay (scrolling drawtext)
//!                                 │
//! news.mp3 ───────────────► Audio Mux (copy video, aac)
//!                                 │
//!                                 ▼
//!                            final.mp4 ──┐
//!                                        ├── PIP Composite (resize, overlay)
//! anchor.mp4 ────────────────────────────┘         │
//!                                                  ▼
//!                                            final_pip.mp4
//! ```

pub mod assemble;
pub mod codec;
pub mod engine;
pub mod fake;
pub mod inspect;
pub mod mux;
pub mod normalize;
pub mod overlay;
pub mod pip;
pub mod pipeline;
pub mod scratch;

pub use engine::{EngineFailure, FfmpegEngine, Invocation, MediaEngine, ProbeReport, Stage};
pub use pipeline::*;
