//! Newsreel Media Model
//!
//! Data contracts and pure planning logic for the composition pipeline:
//! - **Media:** probed properties of clips and stage artifacts
//! - **Timeline:** loop/trim plan reconciling clips with the narration length
//! - **Overlay:** wrapped script text and scroll geometry
//! - **Placement:** picture-in-picture box and corner names
//! - **Job:** the collaborator outputs a single run consumes
//!
//! Nothing here invokes the media engine; every decision the renderer makes
//! is computed here first so it can be tested without media files.

pub mod job;
pub mod media;
pub mod overlay;
pub mod placement;
pub mod timeline;

pub use job::*;
pub use media::*;
pub use overlay::*;
pub use placement::*;
pub use timeline::*;

pub use newsreel_common::config::{FillPolicy, OverlayPosition};
