//! Image preprocessing for paper detection
//!
//! Grayscale conversion, noise smoothing and edge extraction ahead of contour
//! search.

use image::{GrayImage, RgbImage};
use imageproc::distance_transform::Norm;
use tracing::debug;

/// Edge extraction parameters for one detection cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeParams {
    /// Smoothing kernel size (coerced to an odd value >= 1)
    pub blur_kernel_size: u32,
    /// Canny hysteresis low threshold
    pub canny_low: f32,
    /// Canny hysteresis high threshold
    pub canny_high: f32,
    /// Dilation radius for closing gaps in the outline (0 disables)
    pub dilate_radius: u8,
}

/// Coerce a kernel size to the nearest valid odd size >= 1.
/// Even sizes round up.
pub fn coerce_kernel_size(size: u32) -> u32 {
    if size <= 1 {
        1
    } else if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

/// Gaussian sigma for an odd kernel size, following the usual
/// `0.3 * ((k - 1) / 2 - 1) + 0.8` rule.
pub fn kernel_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Convert an RGB frame to single-channel intensity
pub fn to_grayscale(frame: &RgbImage) -> GrayImage {
    image::imageops::grayscale(frame)
}

/// Gaussian smoothing with a kernel size; size 1 returns the input unchanged
pub fn smooth(gray: &GrayImage, kernel_size: u32) -> GrayImage {
    let kernel = coerce_kernel_size(kernel_size);
    if kernel == 1 {
        return gray.clone();
    }
    imageproc::filter::gaussian_blur_f32(gray, kernel_sigma(kernel))
}

/// Binary edge map (0 / 255) of a grayscale image
pub fn edge_map(gray: &GrayImage, params: &EdgeParams) -> GrayImage {
    let (low, high) = ordered_thresholds(params.canny_low, params.canny_high);

    let smoothed = smooth(gray, params.blur_kernel_size);
    let edges = imageproc::edges::canny(&smoothed, low, high);

    if params.dilate_radius == 0 {
        edges
    } else {
        imageproc::morphology::dilate(&edges, Norm::LInf, params.dilate_radius)
    }
}

/// Canny needs `low <= high`; swapped input is reordered rather than rejected
fn ordered_thresholds(low: f32, high: f32) -> (f32, f32) {
    let low = low.max(0.0);
    let high = high.max(0.0);
    if low > high {
        debug!("Canny thresholds inverted ({} > {}), swapping", low, high);
        (high, low)
    } else {
        (low, high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn test_coerce_kernel_size() {
        assert_eq!(coerce_kernel_size(0), 1);
        assert_eq!(coerce_kernel_size(1), 1);
        assert_eq!(coerce_kernel_size(2), 3);
        assert_eq!(coerce_kernel_size(5), 5);
        assert_eq!(coerce_kernel_size(8), 9);
    }

    #[test]
    fn test_kernel_sigma_positive_for_valid_kernels() {
        for k in [3, 5, 7, 21] {
            assert!(kernel_sigma(k) > 0.0, "sigma for {} should be positive", k);
        }
        assert!((kernel_sigma(3) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_smooth_identity_for_unit_kernel() {
        let gray = GrayImage::from_fn(4, 4, |x, y| Luma([(x * 40 + y) as u8]));
        assert_eq!(smooth(&gray, 1), gray);
        assert_eq!(smooth(&gray, 0), gray);
    }

    #[test]
    fn test_grayscale_weights() {
        let mut frame = RgbImage::new(2, 1);
        frame.put_pixel(0, 0, Rgb([0, 0, 255]));
        frame.put_pixel(1, 0, Rgb([0, 255, 0]));

        let gray = to_grayscale(&frame);
        assert!(gray.get_pixel(1, 0)[0] > gray.get_pixel(0, 0)[0]);
    }

    #[test]
    fn test_edge_map_finds_step_edge() {
        let gray = GrayImage::from_fn(40, 40, |x, _| Luma([if x < 20 { 0 } else { 255 }]));
        let params = EdgeParams {
            blur_kernel_size: 3,
            canny_low: 150.0,
            canny_high: 50.0,
            dilate_radius: 0,
        };

        let edges = edge_map(&gray, &params);
        let edge_columns: Vec<u32> = (0..40).filter(|&x| edges.get_pixel(x, 20)[0] > 0).collect();

        assert!(!edge_columns.is_empty(), "step edge should be detected");
        assert!(edge_columns.iter().all(|&x| (17..=22).contains(&x)));
        assert_eq!(edges.get_pixel(5, 20)[0], 0);
    }

    #[test]
    fn test_dilation_thickens_edges() {
        let gray = GrayImage::from_fn(40, 40, |x, _| Luma([if x < 20 { 0 } else { 255 }]));
        let mut params = EdgeParams {
            blur_kernel_size: 3,
            canny_low: 50.0,
            canny_high: 150.0,
            dilate_radius: 0,
        };
        let thin = edge_map(&gray, &params);
        params.dilate_radius = 2;
        let thick = edge_map(&gray, &params);

        let count = |img: &GrayImage| img.pixels().filter(|p| p[0] > 0).count();
        assert!(count(&thick) > count(&thin));
    }
}
