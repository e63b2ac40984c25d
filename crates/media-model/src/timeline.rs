//! Timeline planning: reconciling a clip sequence with a target duration.
//!
//! The plan is computed purely from clip durations, before any external
//! invocation, so the loop/trim decisions can be inspected and tested
//! without rendering anything.

use newsreel_common::config::FillPolicy;
use newsreel_common::error::{NewsreelError, NewsreelResult};
use serde::{Deserialize, Serialize};

use crate::media::Clip;

/// Role of an entry on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryRole {
    /// Played once at the start, never looped.
    Intro,
    /// Stock footage, looped as a whole sequence when needed.
    Content,
}

/// One placement of a clip on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub clip: Clip,
    pub role: EntryRole,
    /// Index of the clip in the content list (0 for the intro).
    pub source_index: usize,
    /// Zero-based pass over the content sequence.
    pub pass: usize,
    /// Seconds of the clip actually used.
    pub used_secs: f64,
    /// Seconds of frozen last frame appended after the clip.
    pub hold_secs: f64,
}

impl TimelineEntry {
    /// Whether the clip is cut short.
    pub fn is_trimmed(&self) -> bool {
        self.used_secs + 1e-9 < self.clip.duration_secs()
    }

    /// Seconds this entry contributes to the timeline.
    pub fn span_secs(&self) -> f64 {
        self.used_secs + self.hold_secs
    }
}

/// Ordered, duration-reconciled sequence of normalized clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
    pub target_secs: f64,
    /// Number of passes over the content sequence the plan allowed for.
    pub loops: usize,
}

impl Timeline {
    /// Plan a timeline covering exactly `target_secs`.
    ///
    /// With [`FillPolicy::Loop`] the content sequence is repeated from the
    /// start, in order, `ceil(remaining / total)` times; only the last
    /// included clip is trimmed. With [`FillPolicy::Hold`] the sequence is
    /// played once and the last frame is held for any shortfall.
    pub fn plan(
        intro: Option<&Clip>,
        content: &[Clip],
        target_secs: f64,
        policy: FillPolicy,
    ) -> NewsreelResult<Self> {
        if content.is_empty() {
            return Err(NewsreelError::NoClipsAvailable);
        }
        if !target_secs.is_finite() || target_secs <= 0.0 {
            return Err(NewsreelError::invalid_input(format!(
                "target duration must be positive, got {target_secs}"
            )));
        }
        if let Some(bad) = content
            .iter()
            .chain(intro)
            .find(|c| !(c.duration_secs() > 0.0))
        {
            return Err(NewsreelError::invalid_input(format!(
                "clip {} has no duration",
                bad.path.display()
            )));
        }

        let mut entries = Vec::new();
        let mut filled = 0.0;

        if let Some(intro) = intro {
            let used = intro.duration_secs().min(target_secs);
            entries.push(TimelineEntry {
                clip: intro.clone(),
                role: EntryRole::Intro,
                source_index: 0,
                pass: 0,
                used_secs: used,
                hold_secs: 0.0,
            });
            filled += used;
        }

        let remaining = target_secs - filled;
        let total: f64 = content.iter().map(Clip::duration_secs).sum();

        let loops = match policy {
            _ if remaining <= 1e-9 => 0,
            FillPolicy::Loop => ((remaining / total) - 1e-9).ceil().max(1.0) as usize,
            FillPolicy::Hold => 1,
        };

        'passes: for pass in 0..loops {
            for (index, clip) in content.iter().enumerate() {
                let left = target_secs - filled;
                if left <= 1e-9 {
                    break 'passes;
                }
                let used = clip.duration_secs().min(left);
                entries.push(TimelineEntry {
                    clip: clip.clone(),
                    role: EntryRole::Content,
                    source_index: index,
                    pass,
                    used_secs: used,
                    hold_secs: 0.0,
                });
                filled += used;
            }
        }

        let shortfall = target_secs - filled;
        if policy == FillPolicy::Hold && shortfall > 1e-9 {
            if let Some(last) = entries.last_mut() {
                last.hold_secs = shortfall;
            }
        }

        Ok(Self {
            entries,
            target_secs,
            loops,
        })
    }

    /// Total seconds covered by the entries.
    pub fn total_secs(&self) -> f64 {
        self.entries.iter().map(TimelineEntry::span_secs).sum()
    }

    /// Content entries only, in play order.
    pub fn content_entries(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.entries.iter().filter(|e| e.role == EntryRole::Content)
    }

    /// Number of entries cut short (0 or 1).
    pub fn trimmed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_trimmed()).count()
    }
}
