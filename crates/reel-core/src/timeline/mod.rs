//! Preview timeline: scenes, cumulative offsets, index resolution and the
//! playback clock that scrubs across them.

mod clock;
mod resolve;

pub use clock::{EndBehavior, PlaybackState, TimelineClock};
pub use resolve::resolve;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::script::{SceneData, Script};

#[derive(Debug, Error, PartialEq)]
pub enum TimelineError {
    #[error("scene {index} has invalid duration {duration} (must be finite and > 0)")]
    InvalidDuration { index: usize, duration: f64 },
}

/// One discrete unit of the timeline. Immutable once the timeline is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub index: usize,
    pub duration: f64,
    pub content: SceneData,
}

/// Ordered scenes plus the derived cumulative offset table.
///
/// `offsets` has `len() + 1` entries: `offsets[i]` is the start of scene `i`
/// and the last entry is the total duration.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    scenes: Vec<Scene>,
    offsets: Vec<f64>,
}

impl Timeline {
    /// Build a timeline from authored scenes, assigning indices by position.
    pub fn new(scenes: Vec<SceneData>) -> Result<Self, TimelineError> {
        let mut offsets = Vec::with_capacity(scenes.len() + 1);
        let mut acc = 0.0;
        offsets.push(acc);
        let mut out = Vec::with_capacity(scenes.len());
        for (index, content) in scenes.into_iter().enumerate() {
            let duration = content.duration;
            if !duration.is_finite() || duration <= 0.0 {
                return Err(TimelineError::InvalidDuration { index, duration });
            }
            acc += duration;
            offsets.push(acc);
            out.push(Scene {
                index,
                duration,
                content,
            });
        }
        Ok(Self {
            scenes: out,
            offsets,
        })
    }

    pub fn from_script(script: &Script) -> Result<Self, TimelineError> {
        Self::new(script.scenes.clone())
    }

    /// A timeline with no scenes; total is 0.
    pub fn empty() -> Self {
        Self {
            scenes: Vec::new(),
            offsets: vec![0.0],
        }
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.offsets[self.scenes.len()]
    }

    /// Start offset of scene `index`, clamped to the last scene.
    pub fn scene_start(&self, index: usize) -> f64 {
        if self.scenes.is_empty() {
            return 0.0;
        }
        self.offsets[index.min(self.scenes.len() - 1)]
    }

    /// Scene index at `time` after clamping into `[0, total]`.
    /// Returns None for an empty timeline.
    pub fn scene_at(&self, time: f64) -> Option<usize> {
        if self.scenes.is_empty() {
            return None;
        }
        let t = if time.is_nan() { 0.0 } else { time.clamp(0.0, self.total()) };
        Some(resolve(t, &self.offsets))
    }
}
