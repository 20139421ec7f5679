//! Vision Layer
//!
//! Turns camera frames into paper keyboard geometry:
//! - grayscale, smoothing and Canny edges ([`preprocess`])
//! - dominant outline and corner ordering ([`contour`])
//! - rectification onto the canonical rectangle ([`homography`])
//! - key partition of that rectangle ([`layout`])
//! - the stateful detector tying them together ([`surface`])

pub mod contour;
pub mod homography;
pub mod layout;
pub mod preprocess;
pub mod surface;

pub use homography::{Homography, HomographyError};
pub use layout::{uniform_key_regions, KeyRegion, LayoutAxis};
pub use surface::{
    DetectionFailure, DetectionStatus, SurfaceDetector, SurfaceDetectorConfig, SurfaceGeometry,
};
