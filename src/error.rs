//! Typed errors for the library layers
//!
//! Detection failures are not errors: they are reported through
//! [`crate::vision::DetectionStatus`] and never leave the frame loop.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid configuration values, rejected when a config is applied
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("canny thresholds must satisfy 0 < low < high (got low={low}, high={high})")]
    CannyThresholds { low: f32, high: f32 },

    #[error("{name} must be positive (got {value})")]
    NonPositive { name: &'static str, value: f64 },

    #[error("untouch distance {untouch} is below touch distance {touch}")]
    InvertedTouchThresholds { touch: f32, untouch: f32 },

    #[error("volume must be within 0.0..=1.0 (got {0})")]
    Volume(f32),
}

/// Failures of the sound playback path
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("sound directory not found: {0:?}")]
    MissingSoundDir(PathBuf),

    #[error("failed to read clip {path:?}: {source}")]
    ReadClip {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("clip index {index} out of range ({count} clips loaded)")]
    ClipOutOfRange { index: usize, count: usize },

    #[error("audio device unavailable: {0}")]
    Device(String),

    #[error("failed to decode clip {index}: {message}")]
    Decode { index: usize, message: String },

    #[error("playback worker is not running")]
    WorkerGone,
}

/// Failures of the external frame / fingertip sources
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("frame directory not found: {0:?}")]
    MissingDir(PathBuf),

    #[error("failed to decode frame {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to read fingertip track {path:?}: {source}")]
    Track {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid fingertip track: {0}")]
    TrackFormat(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
