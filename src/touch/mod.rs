//! Touch Validation Layer
//!
//! Converts fingertip proximity into a debounced per-key event stream. Each
//! key runs its own hysteresis state machine ([`state::KeyTouch`]); the
//! validator owns the table of them, indexed by key.

pub mod state;

use tracing::debug;

use crate::vision::KeyRegion;
pub use state::{KeyTouch, TouchState, TouchThresholds, Transition};

/// A tracked fingertip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fingertip {
    /// Finger slot reported by the tracker
    pub slot: usize,
    /// Position in frame or canonical coordinates, depending on the stage
    pub position: [f64; 2],
    /// Hover height proxy from the tracker (>= 0, smaller = closer), if any
    pub proximity: Option<f64>,
}

impl Fingertip {
    pub fn new(slot: usize, x: f64, y: f64) -> Self {
        Self {
            slot,
            position: [x, y],
            proximity: None,
        }
    }

    pub fn with_proximity(mut self, proximity: f64) -> Self {
        self.proximity = Some(proximity);
        self
    }

    /// Whether the position and proximity are usable readings
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.proximity.map_or(true, |p| p.is_finite())
    }
}

/// Proximity metric between a fingertip and a key, in canonical units.
///
/// Planar distance to the key rectangle (0 inside), combined with the
/// tracker's hover proxy when present: `sqrt(d^2 + p^2)`. Unusable readings
/// map to infinity.
pub fn proximity_metric(region: &KeyRegion, tip: &Fingertip) -> f32 {
    if !tip.is_finite() {
        return f32::INFINITY;
    }
    let planar = region.distance_to(tip.position);
    let metric = match tip.proximity {
        Some(p) => planar.hypot(p.max(0.0)),
        None => planar,
    };
    metric as f32
}

/// Tracks touch state for every key region
#[derive(Debug, Default)]
pub struct TouchValidator {
    keys: Vec<KeyTouch>,
    last_released: Vec<usize>,
}

impl TouchValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one frame.
    ///
    /// Returns, in ascending order, the keys that went from released to
    /// touched during this call. A change in the number of regions resets
    /// every key to released first.
    pub fn process(
        &mut self,
        regions: &[KeyRegion],
        fingertips: &[Fingertip],
        touch_distance: f32,
        untouch_distance: f32,
    ) -> Vec<usize> {
        let metrics: Vec<f32> = regions
            .iter()
            .map(|region| {
                fingertips
                    .iter()
                    .map(|tip| proximity_metric(region, tip))
                    .fold(f32::INFINITY, f32::min)
            })
            .collect();

        self.process_metrics(&metrics, &TouchThresholds::new(touch_distance, untouch_distance))
    }

    /// Evaluate one frame from precomputed per-key minimum metrics
    pub fn process_metrics(&mut self, metrics: &[f32], thresholds: &TouchThresholds) -> Vec<usize> {
        if metrics.len() != self.keys.len() {
            if !self.keys.is_empty() {
                debug!(
                    "Key count changed {} -> {}, releasing all keys",
                    self.keys.len(),
                    metrics.len()
                );
            }
            self.keys = vec![KeyTouch::default(); metrics.len()];
        }

        self.last_released.clear();
        let mut touched = Vec::new();
        for (index, (key, &metric)) in self.keys.iter_mut().zip(metrics).enumerate() {
            match key.update(metric, thresholds) {
                Some(Transition::Touched) => touched.push(index),
                Some(Transition::Released) => self.last_released.push(index),
                None => {}
            }
        }

        if !touched.is_empty() || !self.last_released.is_empty() {
            debug!("Touched {:?}, released {:?}", touched, self.last_released);
        }
        touched
    }

    /// Per-key state table
    pub fn states(&self) -> &[KeyTouch] {
        &self.keys
    }

    /// Keys currently held down
    pub fn touched_keys(&self) -> Vec<usize> {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, k)| k.is_touched())
            .map(|(i, _)| i)
            .collect()
    }

    /// Keys released during the last call
    pub fn last_released(&self) -> &[usize] {
        &self.last_released
    }

    /// Forget all key state
    pub fn reset(&mut self) {
        self.keys.clear();
        self.last_released.clear();
    }
}
