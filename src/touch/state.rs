//! Per-key touch state machine
//!
//! Two states and two guarded transitions:
//!
//! - `Released -> Touched` when the metric is at or below the touch threshold
//! - `Touched -> Released` when the metric is at or above the untouch threshold
//!
//! Readings between the thresholds never change state.

use tracing::warn;

/// Touch state of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TouchState {
    #[default]
    Released,
    Touched,
}

/// A state change produced by [`KeyTouch::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Touched,
    Released,
}

/// Touch / untouch thresholds forming the hysteresis band.
///
/// Construction clamps the values so that `0 <= touch <= untouch`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchThresholds {
    touch: f32,
    untouch: f32,
}

impl TouchThresholds {
    pub fn new(touch: f32, untouch: f32) -> Self {
        let touch = if touch.is_finite() { touch.max(0.0) } else { 0.0 };
        let untouch = if untouch.is_nan() { touch } else { untouch };
        let untouch = if untouch < touch {
            warn!(
                "Untouch distance {} below touch distance {}, clamping",
                untouch, touch
            );
            touch
        } else {
            untouch
        };
        Self { touch, untouch }
    }

    pub fn touch(&self) -> f32 {
        self.touch
    }

    pub fn untouch(&self) -> f32 {
        self.untouch
    }
}

/// State of one key plus the reading behind its last transition
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KeyTouch {
    /// Current state
    pub state: TouchState,
    /// Metric that caused the last transition
    pub last_transition_metric: Option<f32>,
}

impl KeyTouch {
    /// Feed one metric reading (smaller = closer to the paper)
    pub fn update(&mut self, metric: f32, thresholds: &TouchThresholds) -> Option<Transition> {
        let transition = match self.state {
            TouchState::Released if metric <= thresholds.touch() => {
                self.state = TouchState::Touched;
                Transition::Touched
            }
            TouchState::Touched if metric >= thresholds.untouch() => {
                self.state = TouchState::Released;
                Transition::Released
            }
            _ => return None,
        };
        self.last_transition_metric = Some(metric);
        Some(transition)
    }

    pub fn is_touched(&self) -> bool {
        self.state == TouchState::Touched
    }
}
