//! State shared between the processing loop and whatever drives it
//!
//! Interactive controls live behind a lock so a UI or hotkey thread can
//! adjust them while frames are being processed.

pub mod state;

pub use state::{ControlPanel, ControlValues};
