//! Drawing primitives and colours for the diagnostic views

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

/// Colours and sizes used by the overlay
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    /// Detected paper outline
    pub contour: Rgb<u8>,
    /// Ordered corner markers
    pub corner: Rgb<u8>,
    /// Released key outline
    pub key_released: Rgb<u8>,
    /// Touched key outline
    pub key_touched: Rgb<u8>,
    /// Fingertip markers
    pub fingertip: Rgb<u8>,
    /// Radius of corner and fingertip markers
    pub marker_radius: i32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            contour: Rgb([0, 255, 0]),
            corner: Rgb([255, 0, 0]),
            key_released: Rgb([0, 128, 255]),
            key_touched: Rgb([255, 200, 0]),
            fingertip: Rgb([255, 0, 255]),
            marker_radius: 4,
        }
    }
}

/// Draw a closed outline through `points`
pub fn draw_closed_outline(canvas: &mut RgbImage, points: &[[f64; 2]], color: Rgb<u8>) {
    if points.len() < 2 {
        return;
    }
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        if !(a[0].is_finite() && a[1].is_finite() && b[0].is_finite() && b[1].is_finite()) {
            continue;
        }
        draw_line_segment_mut(
            canvas,
            (a[0] as f32, a[1] as f32),
            (b[0] as f32, b[1] as f32),
            color,
        );
    }
}

/// Draw a marker centred on `p`; filled markers for corners, rings otherwise
pub fn draw_marker(canvas: &mut RgbImage, p: [f64; 2], radius: i32, color: Rgb<u8>, filled: bool) {
    if !(p[0].is_finite() && p[1].is_finite()) {
        return;
    }
    let center = (p[0].round() as i32, p[1].round() as i32);
    if filled {
        draw_filled_circle_mut(canvas, center, radius, color);
    } else {
        draw_hollow_circle_mut(canvas, center, radius, color);
    }
}
