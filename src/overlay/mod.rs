//! Overlay Presentation Layer
//!
//! Builds the diagnostic images shown next to the instrument: the camera
//! frame with the detected outline, corners, key regions and fingertips drawn
//! on it, and the rectified view with the same keys. Each is placed beside its
//! binary edge map.

pub mod widgets;

use image::{imageops, GrayImage, Rgb, RgbImage};

use crate::app::{FrameReport, PianoEngine};
use crate::capture::frame::CapturedFrame;
use crate::touch::{Fingertip, TouchValidator};
use crate::vision::{KeyRegion, SurfaceDetector};
pub use widgets::OverlayStyle;
use widgets::{draw_closed_outline, draw_marker};

/// The two display images of a cycle
#[derive(Debug, Clone)]
pub struct DiagnosticViews {
    /// Annotated frame beside the frame edge map
    pub main: RgbImage,
    /// Annotated rectified view beside its edge map, once the paper is known
    pub warped: Option<RgbImage>,
}

/// Render both views for the frame the engine just processed
pub fn render(engine: &PianoEngine, frame: &CapturedFrame, report: &FrameReport, style: &OverlayStyle) -> DiagnosticViews {
    let detector = engine.detector();
    let validator = engine.validator();

    let annotated = annotate_frame(&frame.image, detector, validator, &report.canonical_fingertips, style);
    let main = match detector.frame_edges() {
        Some(edges) => side_by_side(&annotated, edges),
        None => annotated,
    };

    let warped = detector.warped().map(|warped| {
        let annotated = annotate_warped(
            warped,
            detector.key_regions(),
            validator,
            &report.canonical_fingertips,
            style,
        );
        match detector.warped_edges() {
            Some(edges) => side_by_side(&annotated, edges),
            None => annotated,
        }
    });

    DiagnosticViews { main, warped }
}

/// Draw the accepted geometry and fingertips onto a copy of the frame.
///
/// Key regions and fingertips are canonical and are mapped back through the
/// inverse homography.
pub fn annotate_frame(
    frame: &RgbImage,
    detector: &SurfaceDetector,
    validator: &TouchValidator,
    canonical_tips: &[Fingertip],
    style: &OverlayStyle,
) -> RgbImage {
    let mut canvas = frame.clone();
    let Some(geometry) = detector.geometry() else {
        return canvas;
    };

    draw_closed_outline(&mut canvas, &geometry.contour, style.contour);

    for (index, region) in geometry.regions.iter().enumerate() {
        let outline: Vec<[f64; 2]> = region
            .corners()
            .iter()
            .filter_map(|&c| geometry.to_frame(c))
            .collect();
        if outline.len() == 4 {
            draw_closed_outline(&mut canvas, &outline, key_color(validator, index, style));
        }
    }

    for corner in geometry.corners {
        draw_marker(&mut canvas, corner, style.marker_radius, style.corner, true);
    }

    for tip in canonical_tips {
        if let Some(p) = geometry.to_frame(tip.position) {
            draw_marker(&mut canvas, p, style.marker_radius, style.fingertip, false);
        }
    }

    canvas
}

/// Draw key regions and fingertips onto a copy of the rectified view
pub fn annotate_warped(
    warped: &RgbImage,
    regions: &[KeyRegion],
    validator: &TouchValidator,
    canonical_tips: &[Fingertip],
    style: &OverlayStyle,
) -> RgbImage {
    let mut canvas = warped.clone();
    let (w, h) = canvas.dimensions();

    for (index, region) in regions.iter().enumerate() {
        // Keep the far edges on the canvas
        let outline = region
            .corners()
            .map(|[x, y]| [x.min(w as f64 - 1.0), y.min(h as f64 - 1.0)]);
        draw_closed_outline(&mut canvas, &outline, key_color(validator, index, style));
    }

    for tip in canonical_tips {
        draw_marker(&mut canvas, tip.position, style.marker_radius, style.fingertip, false);
    }

    canvas
}

/// Place a colour image and a binary image next to each other
pub fn side_by_side(color: &RgbImage, binary: &GrayImage) -> RgbImage {
    let (cw, ch) = color.dimensions();
    let (bw, bh) = binary.dimensions();

    let mut out = RgbImage::new(cw + bw, ch.max(bh));
    imageops::replace(&mut out, color, 0, 0);

    let binary_rgb = RgbImage::from_fn(bw, bh, |x, y| {
        let v = binary.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });
    imageops::replace(&mut out, &binary_rgb, cw as i64, 0);
    out
}

fn key_color(validator: &TouchValidator, index: usize, style: &OverlayStyle) -> Rgb<u8> {
    let touched = validator
        .states()
        .get(index)
        .map(|k| k.is_touched())
        .unwrap_or(false);
    if touched {
        style.key_touched
    } else {
        style.key_released
    }
}
