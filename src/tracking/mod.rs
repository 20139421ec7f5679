//! Fingertip Sources
//!
//! Hand-pose estimation happens outside this crate. A [`FingertipSource`]
//! hands the engine the fingertips seen in a frame, in frame coordinates.
//! [`ScriptedFingertips`] replays a recorded JSON track:
//!
//! ```json
//! { "frames": [ { "frame": 0, "fingertips": [ { "slot": 0, "x": 120.0, "y": 88.0, "proximity": 3.5 } ] } ] }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::SourceError;
use crate::touch::Fingertip;

/// Anything that reports fingertips for a frame
pub trait FingertipSource {
    /// Fingertips seen in frame `frame_index`, limited to slots below
    /// `tracked_fingers`
    fn fingertips(&mut self, frame_index: u64, tracked_fingers: usize) -> Vec<Fingertip>;
}

/// Source that never sees a hand
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFingertips;

impl FingertipSource for NoFingertips {
    fn fingertips(&mut self, _frame_index: u64, _tracked_fingers: usize) -> Vec<Fingertip> {
        Vec::new()
    }
}

/// One fingertip entry of a recorded track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPoint {
    pub slot: usize,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proximity: Option<f64>,
}

/// Fingertips of one recorded frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackFrame {
    pub frame: u64,
    #[serde(default)]
    pub fingertips: Vec<TrackPoint>,
}

/// A recorded fingertip track
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FingertipTrack {
    pub frames: Vec<TrackFrame>,
}

/// Replays a [`FingertipTrack`] by frame index
#[derive(Debug, Default)]
pub struct ScriptedFingertips {
    frames: HashMap<u64, Vec<Fingertip>>,
}

impl ScriptedFingertips {
    /// Build from an in-memory track; later entries for a frame win
    pub fn from_track(track: FingertipTrack) -> Self {
        let frames = track
            .frames
            .into_iter()
            .map(|f| {
                let tips = f
                    .fingertips
                    .into_iter()
                    .map(|p| Fingertip {
                        slot: p.slot,
                        position: [p.x, p.y],
                        proximity: p.proximity,
                    })
                    .collect();
                (f.frame, tips)
            })
            .collect();
        Self { frames }
    }

    /// Parse a JSON track
    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        let track: FingertipTrack = serde_json::from_str(json)?;
        Ok(Self::from_track(track))
    }

    /// Load a JSON track from file
    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path).map_err(|source| SourceError::Track {
            path: path.to_path_buf(),
            source,
        })?;
        let scripted = Self::from_json(&content)?;
        info!("Loaded fingertip track with {} frames from {:?}", scripted.frames.len(), path);
        Ok(scripted)
    }

    /// Number of frames with recorded fingertips
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl FingertipSource for ScriptedFingertips {
    fn fingertips(&mut self, frame_index: u64, tracked_fingers: usize) -> Vec<Fingertip> {
        self.frames
            .get(&frame_index)
            .map(|tips| {
                tips.iter()
                    .filter(|t| t.slot < tracked_fingers)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }
}
