//! Live-adjustable parameters shared with the processing loop

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::config::AppConfig;
use crate::playback::SelectionPolicy;

/// Largest blur radius a control may set
pub const MAX_BLUR_RADIUS: u32 = 15;
/// Upper bound of the Canny threshold sliders
pub const MAX_CANNY_THRESHOLD: f32 = 1000.0;

/// Current values of every interactive control
#[derive(Debug, Clone, PartialEq)]
pub struct ControlValues {
    /// Gaussian blur radius (kernel = 2 * radius + 1)
    pub blur_radius: u32,
    /// Canny low threshold
    pub canny_low: f32,
    /// Canny high threshold
    pub canny_high: f32,
    /// Metric at or below which a key becomes touched
    pub touch_distance: f32,
    /// Metric at or above which a touched key is released
    pub untouch_distance: f32,
    /// Reuse the locked geometry instead of detecting
    pub freeze_detection: bool,
    /// Finger slots considered per frame
    pub tracked_fingers: usize,
    /// Number of printed keys
    pub key_count: usize,
    /// Clip selection policy
    pub policy: SelectionPolicy,
}

impl Default for ControlValues {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ControlValues {
    /// Seed the controls from configuration
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            blur_radius: config.detection.blur_radius.min(MAX_BLUR_RADIUS),
            canny_low: config.detection.canny_low,
            canny_high: config.detection.canny_high,
            touch_distance: config.touch.touch_distance,
            untouch_distance: config.touch.untouch_distance,
            freeze_detection: config.controls.freeze_detection,
            tracked_fingers: config.touch.tracked_fingers,
            key_count: config.detection.key_count,
            policy: config.playback.policy,
        }
    }

    /// Blur kernel size derived from the radius
    pub fn blur_kernel_size(&self) -> u32 {
        self.blur_radius * 2 + 1
    }
}

/// Thread-safe handle to the control values.
///
/// Clones share the same values. Setters clamp out-of-range input instead of
/// rejecting it.
#[derive(Debug, Clone, Default)]
pub struct ControlPanel {
    values: Arc<RwLock<ControlValues>>,
}

impl ControlPanel {
    pub fn new(values: ControlValues) -> Self {
        Self {
            values: Arc::new(RwLock::new(values)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(ControlValues::from_config(config))
    }

    /// Copy of the current values
    pub fn snapshot(&self) -> ControlValues {
        self.values.read().clone()
    }

    pub fn set_blur_radius(&self, radius: u32) {
        self.values.write().blur_radius = radius.min(MAX_BLUR_RADIUS);
    }

    /// Set both Canny thresholds; the detector swaps an inverted pair
    pub fn set_canny(&self, low: f32, high: f32) {
        let mut values = self.values.write();
        values.canny_low = clamp_threshold(low);
        values.canny_high = clamp_threshold(high);
    }

    /// Set the touch band, raising `untouch` to `touch` if needed
    pub fn set_touch_thresholds(&self, touch: f32, untouch: f32) {
        let touch = if touch.is_finite() { touch.max(0.0) } else { 0.0 };
        let untouch = if untouch.is_nan() { touch } else { untouch.max(touch) };

        let mut values = self.values.write();
        values.touch_distance = touch;
        values.untouch_distance = untouch;
    }

    pub fn set_freeze(&self, freeze: bool) {
        self.values.write().freeze_detection = freeze;
    }

    /// Flip the freeze flag, returning the new value
    pub fn toggle_freeze(&self) -> bool {
        let mut values = self.values.write();
        values.freeze_detection = !values.freeze_detection;
        debug!("Freeze detection: {}", values.freeze_detection);
        values.freeze_detection
    }

    pub fn set_tracked_fingers(&self, fingers: usize) {
        self.values.write().tracked_fingers = fingers.max(1);
    }

    pub fn set_key_count(&self, keys: usize) {
        self.values.write().key_count = keys.max(1);
    }

    pub fn set_policy(&self, policy: SelectionPolicy) {
        self.values.write().policy = policy;
    }
}

fn clamp_threshold(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, MAX_CANNY_THRESHOLD)
    } else {
        0.0
    }
}
