//! Piano Engine
//!
//! Runs the per-frame cycle: detect the paper (unless frozen), bring the
//! fingertips into canonical space, validate touches and dispatch sounds for
//! newly touched keys.

use tracing::{debug, info, warn};

use crate::capture::frame::CapturedFrame;
use crate::capture::FrameSource;
use crate::config::AppConfig;
use crate::playback::PlaybackDispatcher;
use crate::shared::{ControlPanel, ControlValues};
use crate::touch::{Fingertip, TouchState, TouchValidator};
use crate::tracking::FingertipSource;
use crate::vision::{DetectionStatus, KeyRegion, SurfaceDetector, SurfaceDetectorConfig};

/// Outcome of one processed frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Index of the frame in the session
    pub frame_index: u64,
    /// Detection outcome for this frame
    pub status: DetectionStatus,
    /// Keys that became touched, ascending
    pub triggered: Vec<usize>,
    /// Keys that were released, ascending
    pub released: Vec<usize>,
    /// Fingertips that reached the validator, in canonical coordinates
    pub canonical_fingertips: Vec<Fingertip>,
    /// Playback commands queued for this frame
    pub dispatched: usize,
}

/// Read-only view of the engine for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    /// Frames processed so far
    pub frames_processed: u64,
    /// Outcome of the most recent detection cycle
    pub status: Option<DetectionStatus>,
    /// Ordered corners of the accepted outline, frame coordinates
    pub corners: Option<[[f64; 2]; 4]>,
    /// Key regions in canonical coordinates
    pub key_regions: Vec<KeyRegion>,
    /// Touch state per key
    pub key_states: Vec<TouchState>,
    /// Total playback commands queued
    pub triggers_sent: u64,
    /// Control values used for the last frame
    pub controls: ControlValues,
}

/// Totals for a whole session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub skipped_frames: u64,
    pub accepted: u64,
    pub failed: u64,
    pub triggers: u64,
}

/// Owns the detection, validation and playback stages
pub struct PianoEngine {
    detector: SurfaceDetector,
    validator: TouchValidator,
    dispatcher: Option<PlaybackDispatcher>,
    controls: ControlPanel,
    frames_processed: u64,
    triggers_sent: u64,
}

impl PianoEngine {
    /// Create an engine whose controls are seeded from `config`
    pub fn new(config: &AppConfig) -> Self {
        Self::with_controls(config, ControlPanel::from_config(config))
    }

    /// Create an engine driven by an existing control panel
    pub fn with_controls(config: &AppConfig, controls: ControlPanel) -> Self {
        Self {
            detector: SurfaceDetector::new(SurfaceDetectorConfig::from(&config.detection)),
            validator: TouchValidator::new(),
            dispatcher: None,
            controls,
            frames_processed: 0,
            triggers_sent: 0,
        }
    }

    /// Attach a playback dispatcher
    pub fn with_dispatcher(mut self, dispatcher: PlaybackDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Lock the paper to known corners instead of waiting for detection
    pub fn calibrate(&mut self, corners: [[f64; 2]; 4]) -> DetectionStatus {
        self.detector.accept_corners(corners)
    }

    /// Run one cycle. `fingertips` are in (mirrored) frame coordinates.
    pub fn process_frame(&mut self, frame: &CapturedFrame, fingertips: &[Fingertip]) -> FrameReport {
        let controls = self.controls.snapshot();
        self.detector.set_key_count(controls.key_count);

        let status = if controls.freeze_detection && self.detector.geometry().is_some() {
            self.detector.mark_frozen()
        } else {
            self.detector.process(
                &frame.image,
                controls.blur_kernel_size(),
                controls.canny_low,
                controls.canny_high,
            )
        };

        let canonical_fingertips: Vec<Fingertip> = match self.detector.geometry() {
            Some(geometry) => fingertips
                .iter()
                .filter(|tip| tip.slot < controls.tracked_fingers && tip.is_finite())
                .filter_map(|tip| {
                    let position = geometry.to_canonical(tip.position)?;
                    Some(Fingertip { position, ..*tip })
                })
                .collect(),
            None => Vec::new(),
        };

        let regions = self.detector.key_regions();
        let triggered = self.validator.process(
            regions,
            &canonical_fingertips,
            controls.touch_distance,
            controls.untouch_distance,
        );
        let released = self.validator.last_released().to_vec();

        let dispatched = match &self.dispatcher {
            Some(dispatcher) => dispatcher.play_keys(regions.len(), &triggered, controls.policy),
            None => 0,
        };

        if !triggered.is_empty() {
            info!("Frame {}: keys {:?} pressed", frame.index, triggered);
        }
        debug!(
            "Frame {}: {:?}, {} fingertips, {} dispatched",
            frame.index,
            status,
            canonical_fingertips.len(),
            dispatched
        );

        self.frames_processed += 1;
        self.triggers_sent += dispatched as u64;

        FrameReport {
            frame_index: frame.index,
            status,
            triggered,
            released,
            canonical_fingertips,
            dispatched,
        }
    }

    /// Drive the engine until `frames` is exhausted.
    ///
    /// Frames that fail to load are skipped. `on_frame` sees each processed
    /// frame with its report and the engine state after the cycle.
    pub fn run<F>(
        &mut self,
        frames: &mut dyn FrameSource,
        fingertips: &mut dyn FingertipSource,
        mut on_frame: F,
    ) -> SessionSummary
    where
        F: FnMut(&CapturedFrame, &FrameReport, &PianoEngine),
    {
        let mut summary = SessionSummary::default();

        while let Some(next) = frames.next_frame() {
            let frame = match next {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Skipping frame: {}", e);
                    summary.skipped_frames += 1;
                    continue;
                }
            };

            let tracked = self.controls.snapshot().tracked_fingers;
            let tips = fingertips.fingertips(frame.index, tracked);
            let report = self.process_frame(&frame, &tips);

            summary.frames += 1;
            match report.status {
                DetectionStatus::Accepted => summary.accepted += 1,
                DetectionStatus::Failed(_) => summary.failed += 1,
                DetectionStatus::Frozen => {}
            }
            summary.triggers += report.dispatched as u64;

            on_frame(&frame, &report, self);
        }

        info!(
            "Session finished: {} frames ({} skipped), {} accepted, {} failed, {} triggers",
            summary.frames, summary.skipped_frames, summary.accepted, summary.failed, summary.triggers
        );
        summary
    }

    /// Current diagnostics
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            frames_processed: self.frames_processed,
            status: self.detector.status(),
            corners: self.detector.corners(),
            key_regions: self.detector.key_regions().to_vec(),
            key_states: self.validator.states().iter().map(|k| k.state).collect(),
            triggers_sent: self.triggers_sent,
            controls: self.controls.snapshot(),
        }
    }

    pub fn detector(&self) -> &SurfaceDetector {
        &self.detector
    }

    pub fn validator(&self) -> &TouchValidator {
        &self.validator
    }

    /// Handle for adjusting controls from another thread
    pub fn controls(&self) -> &ControlPanel {
        &self.controls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PlaybackError, SourceError};
    use crate::playback::{SelectionPolicy, SoundOutput};
    use crate::vision::DetectionFailure;
    use image::{Rgb, RgbImage};
    use imageproc::drawing::draw_polygon_mut;
    use imageproc::point::Point;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Paper spans (20, 20) - (220, 120) in frame coordinates
    const PAPER: [(i32, i32); 4] = [(20, 20), (220, 20), (220, 120), (20, 120)];

    struct RecordingOutput(Arc<Mutex<Vec<usize>>>);

    impl SoundOutput for RecordingOutput {
        fn play(&mut self, clip: usize) -> Result<(), PlaybackError> {
            self.0.lock().push(clip);
            Ok(())
        }
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.detection.canonical_width = 100;
        config.detection.canonical_height = 50;
        config.detection.key_count = 5;
        config.detection.min_quad_area = 100.0;
        config.touch.touch_distance = 5.0;
        config.touch.untouch_distance = 10.0;
        config.playback.policy = SelectionPolicy::PerKey;
        config
    }

    fn engine_with_recorder(clips: usize) -> (PianoEngine, Arc<Mutex<Vec<usize>>>) {
        let played = Arc::new(Mutex::new(Vec::new()));
        let sink = played.clone();
        let dispatcher = PlaybackDispatcher::spawn(clips, move || {
            Ok(Box::new(RecordingOutput(sink)) as Box<dyn SoundOutput>)
        });
        (PianoEngine::new(&config()).with_dispatcher(dispatcher), played)
    }

    fn paper_frame(index: u64) -> CapturedFrame {
        let mut image = RgbImage::from_pixel(240, 160, Rgb([15, 15, 15]));
        let poly: Vec<Point<i32>> = PAPER.iter().map(|&(x, y)| Point::new(x, y)).collect();
        draw_polygon_mut(&mut image, &poly, Rgb([240, 240, 240]));
        CapturedFrame::new(image, index)
    }

    fn blank_frame(index: u64) -> CapturedFrame {
        CapturedFrame::new(RgbImage::from_pixel(240, 160, Rgb([15, 15, 15])), index)
    }

    /// Fingertip over the centre of key 2 (frame x = 120, y = 70)
    fn over_key_two(height: f64) -> Fingertip {
        Fingertip::new(0, 120.0, 70.0).with_proximity(height)
    }

    #[test]
    fn test_scenario_press_hold_release() {
        let (mut engine, played) = engine_with_recorder(5);

        let report = engine.process_frame(&paper_frame(0), &[over_key_two(2.0)]);
        assert_eq!(report.status, DetectionStatus::Accepted);
        assert_eq!(engine.detector().key_regions().len(), 5);
        assert_eq!(report.triggered, vec![2]);
        assert_eq!(report.dispatched, 1);

        let tip = report.canonical_fingertips[0].position;
        assert!((tip[0] - 50.0).abs() < 3.0 && (tip[1] - 25.0).abs() < 3.0, "{:?}", tip);

        let report = engine.process_frame(&paper_frame(1), &[over_key_two(7.0)]);
        assert!(report.triggered.is_empty());

        let report = engine.process_frame(&paper_frame(2), &[over_key_two(12.0)]);
        assert!(report.triggered.is_empty());
        assert_eq!(report.released, vec![2]);

        drop(engine);
        assert_eq!(*played.lock(), vec![2]);
    }

    #[test]
    fn test_failed_detection_keeps_keys_playable() {
        let (mut engine, played) = engine_with_recorder(5);
        engine.process_frame(&paper_frame(0), &[]);
        let regions = engine.detector().key_regions().to_vec();

        let report = engine.process_frame(&blank_frame(1), &[over_key_two(1.0)]);
        assert_eq!(report.status, DetectionStatus::Failed(DetectionFailure::NoContour));
        assert_eq!(engine.detector().key_regions(), regions.as_slice());
        assert_eq!(report.triggered, vec![2]);

        drop(engine);
        assert_eq!(*played.lock(), vec![2]);
    }

    #[test]
    fn test_six_sided_outline_keeps_previous_keys() {
        let (mut engine, played) = engine_with_recorder(5);
        engine.process_frame(&paper_frame(0), &[]);
        let regions = engine.detector().key_regions().to_vec();

        let hexagon = [(20, 70), (60, 20), (180, 20), (220, 70), (180, 120), (60, 120)];
        let mut image = RgbImage::from_pixel(240, 160, Rgb([15, 15, 15]));
        let poly: Vec<Point<i32>> = hexagon.iter().map(|&(x, y)| Point::new(x, y)).collect();
        draw_polygon_mut(&mut image, &poly, Rgb([240, 240, 240]));

        let report = engine.process_frame(&CapturedFrame::new(image, 1), &[over_key_two(1.0)]);

        assert_eq!(report.status, DetectionStatus::Failed(DetectionFailure::VertexCount(6)));
        assert_eq!(engine.detector().key_regions(), regions.as_slice());
        assert_eq!(report.triggered, vec![2]);

        drop(engine);
        assert_eq!(*played.lock(), vec![2]);
    }

    #[test]
    fn test_unusable_fingertips_are_dropped() {
        let mut engine = PianoEngine::new(&config());
        let tips = [
            Fingertip::new(0, f64::NAN, 70.0),
            Fingertip::new(1, 120.0, 70.0).with_proximity(f64::INFINITY),
        ];

        let report = engine.process_frame(&paper_frame(0), &tips);

        assert_eq!(report.status, DetectionStatus::Accepted);
        assert!(report.canonical_fingertips.is_empty());
        assert!(report.triggered.is_empty());
    }

    #[test]
    fn test_freeze_skips_detection() {
        let mut engine = PianoEngine::new(&config());
        engine.process_frame(&paper_frame(0), &[]);
        let corners = engine.snapshot().corners;

        engine.controls().set_freeze(true);
        let report = engine.process_frame(&blank_frame(1), &[over_key_two(0.0)]);

        assert_eq!(report.status, DetectionStatus::Frozen);
        assert_eq!(engine.snapshot().corners, corners);
        assert_eq!(report.triggered, vec![2]);
        assert_eq!(report.dispatched, 0);
    }

    #[test]
    fn test_freeze_before_first_detection_still_detects() {
        let mut config = config();
        config.controls.freeze_detection = true;
        let mut engine = PianoEngine::new(&config);

        assert_eq!(engine.process_frame(&paper_frame(0), &[]).status, DetectionStatus::Accepted);
        assert_eq!(engine.process_frame(&paper_frame(1), &[]).status, DetectionStatus::Frozen);
    }

    #[test]
    fn test_key_count_change_resets_touches() {
        let mut engine = PianoEngine::new(&config());
        let hovering = Fingertip::new(0, 120.0, 70.0).with_proximity(7.0);

        let report = engine.process_frame(&paper_frame(0), &[over_key_two(1.0)]);
        assert_eq!(report.triggered, vec![2]);

        engine.controls().set_key_count(4);
        let report = engine.process_frame(&paper_frame(1), &[hovering]);
        assert!(report.triggered.is_empty());
        assert_eq!(engine.detector().key_regions().len(), 4);
        assert!(engine.validator().touched_keys().is_empty());
    }

    #[test]
    fn test_untracked_slots_are_ignored() {
        let mut engine = PianoEngine::new(&config());
        engine.controls().set_tracked_fingers(1);

        let second_finger = Fingertip::new(1, 120.0, 70.0);
        let report = engine.process_frame(&paper_frame(0), &[second_finger]);

        assert!(report.canonical_fingertips.is_empty());
        assert!(report.triggered.is_empty());
    }

    #[test]
    fn test_no_geometry_no_touches() {
        let mut engine = PianoEngine::new(&config());
        let report = engine.process_frame(&blank_frame(0), &[over_key_two(0.0)]);

        assert!(report.status.is_failure());
        assert!(report.canonical_fingertips.is_empty());
        assert!(engine.snapshot().key_regions.is_empty());
    }

    #[test]
    fn test_calibrate_and_snapshot() {
        let mut engine = PianoEngine::new(&config());
        let status = engine.calibrate([[20.0, 20.0], [220.0, 20.0], [220.0, 120.0], [20.0, 120.0]]);
        assert_eq!(status, DetectionStatus::Accepted);

        engine.controls().set_freeze(true);
        engine.process_frame(&blank_frame(0), &[over_key_two(0.0)]);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.frames_processed, 1);
        assert_eq!(snapshot.status, Some(DetectionStatus::Frozen));
        assert_eq!(snapshot.key_regions.len(), 5);
        assert_eq!(snapshot.key_states[2], TouchState::Touched);
        assert!(snapshot.controls.freeze_detection);
    }

    struct VecFrames(Vec<Result<CapturedFrame, SourceError>>);

    impl FrameSource for VecFrames {
        fn next_frame(&mut self) -> Option<Result<CapturedFrame, SourceError>> {
            if self.0.is_empty() {
                None
            } else {
                Some(self.0.remove(0))
            }
        }
    }

    struct PressOnFrame(u64);

    impl FingertipSource for PressOnFrame {
        fn fingertips(&mut self, frame_index: u64, _tracked_fingers: usize) -> Vec<Fingertip> {
            if frame_index == self.0 {
                vec![over_key_two(0.0)]
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn test_run_session() {
        let (mut engine, played) = engine_with_recorder(5);
        let mut frames = VecFrames(vec![
            Ok(paper_frame(0)),
            Err(SourceError::MissingDir("gone".into())),
            Ok(blank_frame(2)),
            Ok(paper_frame(3)),
        ]);

        let mut seen = Vec::new();
        let summary = engine.run(&mut frames, &mut PressOnFrame(2), |frame, report, _| {
            seen.push((frame.index, report.triggered.clone()));
        });

        assert_eq!(summary.frames, 3);
        assert_eq!(summary.skipped_frames, 1);
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.triggers, 1);
        assert_eq!(seen, vec![(0, vec![]), (2, vec![2]), (3, vec![])]);

        drop(engine);
        assert_eq!(*played.lock(), vec![2]);
    }
}
