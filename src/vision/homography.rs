//! Four-point homography and perspective warping
//!
//! The paper corners are mapped onto a canonical rectangle so key regions can
//! be laid out axis-aligned. The same transform projects fingertips into that
//! space, and its inverse samples the rectified diagnostic views.

use image::{ImageBuffer, Pixel};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use thiserror::Error;

/// Homography estimation failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HomographyError {
    #[error("point correspondences are degenerate (singular system)")]
    Singular,
    #[error("homography has non-finite coefficients")]
    NonFinite,
}

/// 3x3 projective transform, normalized so that `h[2][2] == 1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Exact homography taking each `src[i]` onto `dst[i]`.
    ///
    /// Solves the 8x8 linear system of the direct linear transform with
    /// `h33` fixed to 1.
    pub fn from_correspondences(
        src: &[[f64; 2]; 4],
        dst: &[[f64; 2]; 4],
    ) -> Result<Self, HomographyError> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for i in 0..4 {
            let [x, y] = src[i];
            let [u, v] = dst[i];

            let r = 2 * i;
            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -u * x;
            a[(r, 7)] = -u * y;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -v * x;
            a[(r + 1, 7)] = -v * y;
            b[r + 1] = v;
        }

        let h = a.lu().solve(&b).ok_or(HomographyError::Singular)?;
        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);

        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(HomographyError::NonFinite);
        }
        Ok(Self { matrix })
    }

    /// Homography from four ordered corners onto the rectangle
    /// `(0, 0) - (width, height)` (TL, TR, BR, BL)
    pub fn to_rectangle(
        corners: &[[f64; 2]; 4],
        width: f64,
        height: f64,
    ) -> Result<Self, HomographyError> {
        let rect = [[0.0, 0.0], [width, 0.0], [width, height], [0.0, height]];
        Self::from_correspondences(corners, &rect)
    }

    /// Project a point; `None` when it maps to infinity
    pub fn project(&self, p: [f64; 2]) -> Option<[f64; 2]> {
        let q = self.matrix * Vector3::new(p[0], p[1], 1.0);
        if q[2].abs() < 1e-12 {
            return None;
        }
        Some([q[0] / q[2], q[1] / q[2]])
    }

    /// Homogeneous scale `w` of a projected point. Points on opposite sides
    /// of the vanishing line have opposite signs.
    pub fn w(&self, p: [f64; 2]) -> f64 {
        let m = &self.matrix;
        m[(2, 0)] * p[0] + m[(2, 1)] * p[1] + m[(2, 2)]
    }

    /// Inverse transform
    pub fn inverse(&self) -> Option<Self> {
        let inv = self.matrix.try_inverse()?;
        let scale = inv[(2, 2)];
        if scale.abs() < 1e-12 {
            return Some(Self { matrix: inv });
        }
        Some(Self { matrix: inv / scale })
    }

    /// Underlying matrix
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Row-major coefficients
    pub fn to_array(&self) -> [[f64; 3]; 3] {
        let m = &self.matrix;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }
}

/// Resample `src` into a `width x height` image.
///
/// `dst_to_src` maps output pixel coordinates back into the source; samples
/// are bilinear and pixels falling outside the source stay black.
pub fn warp_perspective<P>(
    src: &ImageBuffer<P, Vec<u8>>,
    dst_to_src: &Homography,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let mut out = ImageBuffer::<P, Vec<u8>>::new(width, height);
    let (src_w, src_h) = src.dimensions();
    if src_w == 0 || src_h == 0 {
        return out;
    }
    let max_x = (src_w - 1) as f64;
    let max_y = (src_h - 1) as f64;
    let channels = P::CHANNEL_COUNT as usize;

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let Some([sx, sy]) = dst_to_src.project([x as f64, y as f64]) else {
            continue;
        };
        if !(0.0..=max_x).contains(&sx) || !(0.0..=max_y).contains(&sy) {
            continue;
        }

        // Bilinear interpolation
        let x0 = sx.floor() as u32;
        let y0 = sy.floor() as u32;
        let x1 = (x0 + 1).min(src_w - 1);
        let y1 = (y0 + 1).min(src_h - 1);
        let fx = sx - x0 as f64;
        let fy = sy - y0 as f64;

        let p00 = src.get_pixel(x0, y0).channels();
        let p01 = src.get_pixel(x1, y0).channels();
        let p10 = src.get_pixel(x0, y1).channels();
        let p11 = src.get_pixel(x1, y1).channels();

        let mut values = [0u8; 4];
        for c in 0..channels.min(4) {
            let v0 = p00[c] as f64 * (1.0 - fx) + p01[c] as f64 * fx;
            let v1 = p10[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
            values[c] = (v0 * (1.0 - fy) + v1 * fy).round().clamp(0.0, 255.0) as u8;
        }
        *pixel = *P::from_slice(&values[..channels]);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn assert_close(a: [f64; 2], b: [f64; 2]) {
        assert!(
            (a[0] - b[0]).abs() < 1e-6 && (a[1] - b[1]).abs() < 1e-6,
            "{:?} != {:?}",
            a,
            b
        );
    }

    #[test]
    fn test_identity_rectangle() {
        let corners = [[0.0, 0.0], [100.0, 0.0], [100.0, 50.0], [0.0, 50.0]];
        let h = Homography::to_rectangle(&corners, 100.0, 50.0).unwrap();

        assert_close(h.project([37.0, 12.5]).unwrap(), [37.0, 12.5]);
        let m = h.to_array();
        assert!((m[0][0] - 1.0).abs() < 1e-9);
        assert!((m[1][1] - 1.0).abs() < 1e-9);
        assert!(m[2][0].abs() < 1e-9);
    }

    #[test]
    fn test_maps_corners_onto_rectangle() {
        let corners = [[12.0, 8.0], [190.0, 20.0], [175.0, 120.0], [20.0, 140.0]];
        let h = Homography::to_rectangle(&corners, 400.0, 100.0).unwrap();

        assert_close(h.project(corners[0]).unwrap(), [0.0, 0.0]);
        assert_close(h.project(corners[1]).unwrap(), [400.0, 0.0]);
        assert_close(h.project(corners[2]).unwrap(), [400.0, 100.0]);
        assert_close(h.project(corners[3]).unwrap(), [0.0, 100.0]);
    }

    #[test]
    fn test_inverse_round_trip() {
        let corners = [[12.0, 8.0], [190.0, 20.0], [175.0, 120.0], [20.0, 140.0]];
        let h = Homography::to_rectangle(&corners, 400.0, 100.0).unwrap();
        let inv = h.inverse().unwrap();

        let p = [90.0, 70.0];
        assert_close(inv.project(h.project(p).unwrap()).unwrap(), p);
        assert_close(inv.project([400.0, 100.0]).unwrap(), corners[2]);
    }

    #[test]
    fn test_collinear_points_are_singular() {
        let corners = [[0.0, 0.0], [10.0, 0.0], [20.0, 0.0], [30.0, 0.0]];
        assert!(Homography::to_rectangle(&corners, 100.0, 50.0).is_err());
    }

    #[test]
    fn test_warp_identity_copies_pixels() {
        let src = GrayImage::from_fn(8, 6, |x, y| Luma([(x * 20 + y) as u8]));
        let corners = [[0.0, 0.0], [8.0, 0.0], [8.0, 6.0], [0.0, 6.0]];
        let h = Homography::to_rectangle(&corners, 8.0, 6.0).unwrap();

        let warped = warp_perspective(&src, &h.inverse().unwrap(), 8, 6);
        assert_eq!(warped.get_pixel(3, 2), src.get_pixel(3, 2));
        assert_eq!(warped.get_pixel(7, 5), src.get_pixel(7, 5));
    }

    #[test]
    fn test_warp_crops_region() {
        // Right half white, left half black; rectify only the right half
        let src = GrayImage::from_fn(40, 20, |x, _| Luma([if x >= 20 { 255 } else { 0 }]));
        let corners = [[20.0, 0.0], [39.0, 0.0], [39.0, 19.0], [20.0, 19.0]];
        let h = Homography::to_rectangle(&corners, 10.0, 10.0).unwrap();

        let warped = warp_perspective(&src, &h.inverse().unwrap(), 10, 10);
        assert!(warped.pixels().all(|p| p[0] == 255));
    }
}
