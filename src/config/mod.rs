//! Application Configuration
//!
//! Detection, touch and playback settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::playback::SelectionPolicy;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Paper and key detection settings
    pub detection: DetectionSettings,
    /// Touch validation settings
    pub touch: TouchSettings,
    /// Sound playback settings
    pub playback: PlaybackSettings,
    /// Initial values of the live controls
    pub controls: ControlSettings,
}

/// Paper detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Blur radius; the kernel size is `2 * radius + 1`
    pub blur_radius: u32,
    /// Canny low threshold
    pub canny_low: f32,
    /// Canny high threshold
    pub canny_high: f32,
    /// Dilation radius applied to the edge map (0 disables)
    pub dilate_radius: u8,
    /// Polygon approximation tolerance as a fraction of the contour perimeter
    pub approx_epsilon_ratio: f64,
    /// Smallest accepted paper area in frame pixels
    pub min_quad_area: f64,
    /// Width of the rectified paper view
    pub canonical_width: u32,
    /// Height of the rectified paper view
    pub canonical_height: u32,
    /// Number of printed keys
    pub key_count: usize,
    /// Mirror frames horizontally before processing
    pub mirror: bool,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            blur_radius: 2,
            canny_low: 50.0,
            canny_high: 150.0,
            dilate_radius: 1,
            approx_epsilon_ratio: 0.02,
            min_quad_area: 2000.0,
            canonical_width: 800,
            canonical_height: 300,
            key_count: 8,
            mirror: true,
        }
    }
}

/// Touch validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchSettings {
    /// Metric at or below which a released key becomes touched
    pub touch_distance: f32,
    /// Metric at or above which a touched key is released
    pub untouch_distance: f32,
    /// Number of finger slots read from the fingertip source
    pub tracked_fingers: usize,
}

impl Default for TouchSettings {
    fn default() -> Self {
        Self {
            touch_distance: 5.0,
            untouch_distance: 10.0,
            tracked_fingers: 2,
        }
    }
}

/// Sound playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Play sounds at all
    pub enabled: bool,
    /// How key indexes map to clips
    pub policy: SelectionPolicy,
    /// Directory holding the clips; defaults to the data directory
    pub sounds_dir: Option<PathBuf>,
    /// Playback volume (0.0 - 1.0)
    pub volume: f32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: SelectionPolicy::Uniform,
            sounds_dir: None,
            volume: 0.8,
        }
    }
}

/// Startup values of the live controls
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Start with detection frozen
    pub freeze_detection: bool,
}

impl AppConfig {
    /// Check value ranges and orderings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detection;
        if d.canny_low <= 0.0 || d.canny_high <= d.canny_low {
            return Err(ConfigError::CannyThresholds {
                low: d.canny_low,
                high: d.canny_high,
            });
        }
        positive("detection.approx_epsilon_ratio", d.approx_epsilon_ratio)?;
        positive("detection.canonical_width", d.canonical_width as f64)?;
        positive("detection.canonical_height", d.canonical_height as f64)?;
        positive("detection.key_count", d.key_count as f64)?;
        if d.min_quad_area < 0.0 {
            return Err(ConfigError::NonPositive {
                name: "detection.min_quad_area",
                value: d.min_quad_area,
            });
        }

        let t = &self.touch;
        positive("touch.touch_distance", t.touch_distance as f64)?;
        positive("touch.tracked_fingers", t.tracked_fingers as f64)?;
        if t.untouch_distance < t.touch_distance {
            return Err(ConfigError::InvertedTouchThresholds {
                touch: t.touch_distance,
                untouch: t.untouch_distance,
            });
        }

        if !(0.0..=1.0).contains(&self.playback.volume) {
            return Err(ConfigError::Volume(self.playback.volume));
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

/// Load and validate configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
