//! Paper Piano - a printed keyboard played through a camera
//!
//! A sheet of paper with a printed keyboard is located in every frame,
//! rectified onto a canonical rectangle and split into keys. Fingertips over
//! the keys go through a per-key hysteresis filter, and each confirmed press
//! triggers a sound on a background playback thread.

pub mod app;
pub mod capture;
pub mod config;
pub mod error;
pub mod overlay;
pub mod playback;
pub mod shared;
pub mod storage;
pub mod touch;
pub mod tracking;
pub mod vision;

pub use app::{EngineSnapshot, FrameReport, PianoEngine, SessionSummary};
pub use config::AppConfig;
