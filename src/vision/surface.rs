//! Paper surface detection
//!
//! Finds the sheet's quadrilateral outline, rectifies it onto a canonical
//! rectangle and lays the printed keys out inside it. A frame that does not
//! yield a clean quadrilateral leaves the last accepted geometry in place.

use image::{GrayImage, RgbImage};
use std::fmt;
use tracing::{debug, info, warn};

use super::contour::{
    approximate_polygon, is_convex_quad, largest_contour, order_corners, polygon_area, refine_quad,
};
use super::homography::{warp_perspective, Homography};
use super::layout::{uniform_key_regions, KeyRegion};
use super::preprocess::{edge_map, to_grayscale, EdgeParams};
use crate::config::DetectionSettings;

/// Static detector settings
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceDetectorConfig {
    /// Width of the canonical rectangle
    pub canonical_width: u32,
    /// Height of the canonical rectangle
    pub canonical_height: u32,
    /// Number of keys printed on the paper
    pub key_count: usize,
    /// Edge map dilation radius
    pub dilate_radius: u8,
    /// Polygon tolerance as a fraction of the contour perimeter
    pub approx_epsilon_ratio: f64,
    /// Smallest accepted quadrilateral area (frame pixels)
    pub min_quad_area: f64,
}

impl Default for SurfaceDetectorConfig {
    fn default() -> Self {
        Self::from(&DetectionSettings::default())
    }
}

impl From<&DetectionSettings> for SurfaceDetectorConfig {
    fn from(settings: &DetectionSettings) -> Self {
        Self {
            canonical_width: settings.canonical_width,
            canonical_height: settings.canonical_height,
            key_count: settings.key_count,
            dilate_radius: settings.dilate_radius,
            approx_epsilon_ratio: settings.approx_epsilon_ratio,
            min_quad_area: settings.min_quad_area,
        }
    }
}

/// Why a frame did not produce new geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionFailure {
    /// No closed outline in the edge map
    NoContour,
    /// The dominant outline did not reduce to four corners
    VertexCount(usize),
    /// Four corners, but collapsed, crossed or too small
    Degenerate,
    /// The corners did not admit a homography
    Homography,
}

impl fmt::Display for DetectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoContour => write!(f, "no contour found"),
            Self::VertexCount(n) => write!(f, "contour has {} vertices, need 4", n),
            Self::Degenerate => write!(f, "quadrilateral is degenerate"),
            Self::Homography => write!(f, "homography could not be computed"),
        }
    }
}

/// Outcome of one detection cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionStatus {
    /// New geometry accepted from this frame
    Accepted,
    /// Detection skipped; the locked geometry was reused
    Frozen,
    /// Detection failed; previous geometry retained
    Failed(DetectionFailure),
}

impl DetectionStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Geometry of the last accepted paper outline
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceGeometry {
    /// Outline the corners were taken from, in frame coordinates
    pub contour: Vec<[f64; 2]>,
    /// Corners in TL, TR, BR, BL order, frame coordinates
    pub corners: [[f64; 2]; 4],
    /// Frame -> canonical transform
    pub homography: Homography,
    /// Canonical -> frame transform
    pub inverse: Homography,
    /// Key regions in canonical coordinates
    pub regions: Vec<KeyRegion>,
    /// Sign of the homogeneous scale on the paper side of the vanishing line
    w_sign: f64,
}

impl SurfaceGeometry {
    /// Number of key regions
    pub fn key_count(&self) -> usize {
        self.regions.len()
    }

    /// Map a frame point into canonical coordinates. Points beyond the
    /// vanishing line have no canonical position.
    pub fn to_canonical(&self, p: [f64; 2]) -> Option<[f64; 2]> {
        if self.homography.w(p) * self.w_sign <= 0.0 {
            return None;
        }
        self.homography.project(p)
    }

    /// Map a canonical point back into the frame
    pub fn to_frame(&self, p: [f64; 2]) -> Option<[f64; 2]> {
        self.inverse.project(p)
    }
}

/// Detects the paper keyboard and keeps its geometry across frames
pub struct SurfaceDetector {
    config: SurfaceDetectorConfig,
    geometry: Option<SurfaceGeometry>,
    frame_edges: Option<GrayImage>,
    warped: Option<RgbImage>,
    warped_edges: Option<GrayImage>,
    status: Option<DetectionStatus>,
}

impl SurfaceDetector {
    /// Create a detector with no accepted geometry
    pub fn new(config: SurfaceDetectorConfig) -> Self {
        Self {
            config,
            geometry: None,
            frame_edges: None,
            warped: None,
            warped_edges: None,
            status: None,
        }
    }

    /// Run one detection cycle on a frame.
    ///
    /// Never fails hard: a frame without a usable outline is reported through
    /// the returned status and the previous geometry stays in place.
    pub fn process(
        &mut self,
        frame: &RgbImage,
        blur_kernel_size: u32,
        canny_low: f32,
        canny_high: f32,
    ) -> DetectionStatus {
        let params = EdgeParams {
            blur_kernel_size,
            canny_low,
            canny_high,
            dilate_radius: self.config.dilate_radius,
        };

        let gray = to_grayscale(frame);
        let edges = edge_map(&gray, &params);

        let status = match largest_contour(&edges) {
            Some(contour) => {
                let polygon = approximate_polygon(&contour, self.config.approx_epsilon_ratio);
                let polygon = refine_quad(&contour, &polygon, self.config.dilate_radius as f64);
                self.accept_polygon(contour, &polygon)
            }
            None => self.fail(DetectionFailure::NoContour),
        };

        // Diagnostic views follow the current frame through whatever
        // geometry is in force
        if let Some(geometry) = &self.geometry {
            let (w, h) = (self.config.canonical_width, self.config.canonical_height);
            self.warped = Some(warp_perspective(frame, &geometry.inverse, w, h));
            self.warped_edges = Some(warp_perspective(&edges, &geometry.inverse, w, h));
        }
        self.frame_edges = Some(edges);

        status
    }

    /// Accept an approximated outline if it is a usable quadrilateral.
    ///
    /// `contour` is kept for diagnostics; `polygon` is its approximation.
    pub fn accept_polygon(&mut self, contour: Vec<[f64; 2]>, polygon: &[[f64; 2]]) -> DetectionStatus {
        let Ok(quad) = <[[f64; 2]; 4]>::try_from(polygon) else {
            return self.fail(DetectionFailure::VertexCount(polygon.len()));
        };

        let Some(corners) = order_corners(&quad) else {
            return self.fail(DetectionFailure::Degenerate);
        };
        let area = polygon_area(&corners);
        if !is_convex_quad(&corners) || area < self.config.min_quad_area.max(f64::EPSILON) {
            debug!("Rejecting quadrilateral with area {:.1}", area);
            return self.fail(DetectionFailure::Degenerate);
        }

        let width = self.config.canonical_width as f64;
        let height = self.config.canonical_height as f64;
        let homography = match Homography::to_rectangle(&corners, width, height) {
            Ok(h) => h,
            Err(e) => {
                debug!("Homography failed: {}", e);
                return self.fail(DetectionFailure::Homography);
            }
        };
        let Some(inverse) = homography.inverse() else {
            return self.fail(DetectionFailure::Homography);
        };

        let w_sign = homography.w(corners[0]).signum();
        let regions = uniform_key_regions(width, height, self.config.key_count);
        let previous_keys = self.geometry.as_ref().map(|g| g.key_count());
        if previous_keys != Some(regions.len()) {
            info!("Paper detected with {} keys", regions.len());
        }

        self.geometry = Some(SurfaceGeometry {
            contour,
            corners,
            homography,
            inverse,
            regions,
            w_sign,
        });
        self.status = Some(DetectionStatus::Accepted);
        DetectionStatus::Accepted
    }

    /// Accept four corners directly, e.g. from a manual calibration
    pub fn accept_corners(&mut self, corners: [[f64; 2]; 4]) -> DetectionStatus {
        self.accept_polygon(corners.to_vec(), &corners)
    }

    /// Record a cycle where detection was deliberately skipped
    pub fn mark_frozen(&mut self) -> DetectionStatus {
        self.status = Some(DetectionStatus::Frozen);
        DetectionStatus::Frozen
    }

    /// Change the number of keys used for the next accepted outline
    pub fn set_key_count(&mut self, key_count: usize) {
        if key_count != self.config.key_count {
            info!("Key count changed {} -> {}", self.config.key_count, key_count);
            self.config.key_count = key_count;
        }
    }

    fn fail(&mut self, failure: DetectionFailure) -> DetectionStatus {
        if self.geometry.is_some() {
            debug!("Detection failed ({}), keeping previous geometry", failure);
        } else {
            warn!("Detection failed ({}) and no geometry accepted yet", failure);
        }
        let status = DetectionStatus::Failed(failure);
        self.status = Some(status);
        status
    }

    /// Detector settings
    pub fn config(&self) -> &SurfaceDetectorConfig {
        &self.config
    }

    /// Last accepted geometry
    pub fn geometry(&self) -> Option<&SurfaceGeometry> {
        self.geometry.as_ref()
    }

    /// Key regions of the accepted geometry (empty before the first success)
    pub fn key_regions(&self) -> &[KeyRegion] {
        self.geometry.as_ref().map(|g| g.regions.as_slice()).unwrap_or(&[])
    }

    /// Ordered corners of the accepted geometry
    pub fn corners(&self) -> Option<[[f64; 2]; 4]> {
        self.geometry.as_ref().map(|g| g.corners)
    }

    /// Outcome of the most recent cycle
    pub fn status(&self) -> Option<DetectionStatus> {
        self.status
    }

    /// Binary edge map of the last processed frame
    pub fn frame_edges(&self) -> Option<&GrayImage> {
        self.frame_edges.as_ref()
    }

    /// Rectified colour view of the last processed frame
    pub fn warped(&self) -> Option<&RgbImage> {
        self.warped.as_ref()
    }

    /// Rectified edge map of the last processed frame
    pub fn warped_edges(&self) -> Option<&GrayImage> {
        self.warped_edges.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_polygon_mut;
    use imageproc::point::Point;

    fn detector(width: u32, height: u32, keys: usize) -> SurfaceDetector {
        SurfaceDetector::new(SurfaceDetectorConfig {
            canonical_width: width,
            canonical_height: height,
            key_count: keys,
            dilate_radius: 1,
            approx_epsilon_ratio: 0.02,
            min_quad_area: 100.0,
        })
    }

    fn paper_frame(vertices: &[(i32, i32)]) -> RgbImage {
        let mut frame = RgbImage::from_pixel(240, 180, Rgb([20, 20, 20]));
        let poly: Vec<Point<i32>> = vertices.iter().map(|&(x, y)| Point::new(x, y)).collect();
        draw_polygon_mut(&mut frame, &poly, Rgb([235, 235, 235]));
        frame
    }

    #[test]
    fn test_scenario_rectangle_five_keys() {
        let mut det = detector(100, 50, 5);
        let status = det.accept_corners([[0.0, 0.0], [100.0, 0.0], [100.0, 50.0], [0.0, 50.0]]);

        assert_eq!(status, DetectionStatus::Accepted);
        let regions = det.key_regions();
        assert_eq!(regions.len(), 5);
        for (i, r) in regions.iter().enumerate() {
            assert!((r.min[0] - 20.0 * i as f64).abs() < 1e-9);
            assert!((r.width() - 20.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_permuted_corners_give_same_geometry() {
        let quad = [[30.0, 20.0], [210.0, 35.0], [200.0, 150.0], [25.0, 140.0]];
        let mut reference = detector(400, 100, 8);
        reference.accept_corners(quad);
        let expected = reference.geometry().unwrap().clone();

        for shift in 1..4 {
            let rotated: [[f64; 2]; 4] = std::array::from_fn(|i| quad[(i + shift) % 4]);
            let mut det = detector(400, 100, 8);
            assert_eq!(det.accept_corners(rotated), DetectionStatus::Accepted);

            let geometry = det.geometry().unwrap();
            assert_eq!(geometry.corners, expected.corners);
            assert_eq!(geometry.homography, expected.homography);
        }
    }

    #[test]
    fn test_six_vertices_keeps_previous_geometry() {
        let mut det = detector(100, 50, 5);
        det.accept_corners([[0.0, 0.0], [100.0, 0.0], [100.0, 50.0], [0.0, 50.0]]);
        let before = det.geometry().unwrap().clone();

        let hexagon = [
            [10.0, 0.0],
            [90.0, 0.0],
            [100.0, 25.0],
            [90.0, 50.0],
            [10.0, 50.0],
            [0.0, 25.0],
        ];
        let status = det.accept_polygon(hexagon.to_vec(), &hexagon);

        assert_eq!(status, DetectionStatus::Failed(DetectionFailure::VertexCount(6)));
        assert_eq!(det.status(), Some(status));
        assert_eq!(det.geometry(), Some(&before));
        assert_eq!(det.key_regions().len(), 5);
    }

    #[test]
    fn test_degenerate_quads_rejected() {
        let mut det = detector(100, 50, 5);

        let collinear = [[0.0, 0.0], [50.0, 0.0], [100.0, 0.0], [50.0, 40.0]];
        assert_eq!(
            det.accept_corners(collinear),
            DetectionStatus::Failed(DetectionFailure::Degenerate)
        );

        let tiny = [[0.0, 0.0], [5.0, 0.0], [5.0, 5.0], [0.0, 5.0]];
        assert_eq!(
            det.accept_corners(tiny),
            DetectionStatus::Failed(DetectionFailure::Degenerate)
        );
        assert!(det.geometry().is_none());
        assert!(det.key_regions().is_empty());
    }

    #[test]
    fn test_key_count_applies_on_next_acceptance() {
        let corners = [[0.0, 0.0], [100.0, 0.0], [100.0, 50.0], [0.0, 50.0]];
        let mut det = detector(100, 50, 5);
        det.accept_corners(corners);

        det.set_key_count(4);
        assert_eq!(det.key_regions().len(), 5);

        det.accept_corners(corners);
        assert_eq!(det.key_regions().len(), 4);
    }

    #[test]
    fn test_detects_paper_in_frame() {
        let drawn = [(40, 30), (200, 40), (190, 150), (30, 140)];
        let frame = paper_frame(&drawn);
        let mut det = detector(200, 80, 8);

        let status = det.process(&frame, 5, 50.0, 150.0);
        assert_eq!(status, DetectionStatus::Accepted);

        let corners = det.corners().unwrap();
        for (found, &(x, y)) in corners.iter().zip(drawn.iter()) {
            assert!(
                (found[0] - x as f64).abs() < 6.0 && (found[1] - y as f64).abs() < 6.0,
                "corner {:?} too far from ({}, {})",
                found,
                x,
                y
            );
        }

        assert_eq!(det.key_regions().len(), 8);
        assert_eq!(det.warped().unwrap().dimensions(), (200, 80));
        assert_eq!(det.warped_edges().unwrap().dimensions(), (200, 80));
        assert_eq!(det.frame_edges().unwrap().dimensions(), (240, 180));

        // Interior of the paper rectifies to the paper colour
        let center = det.warped().unwrap().get_pixel(100, 40);
        assert!(center[0] > 200, "center pixel {:?}", center);
    }

    #[test]
    fn test_axis_aligned_paper_corners_are_accurate() {
        let drawn = [(20, 20), (220, 20), (220, 120), (20, 120)];
        let mut frame = RgbImage::from_pixel(240, 160, Rgb([15, 15, 15]));
        let poly: Vec<Point<i32>> = drawn.iter().map(|&(x, y)| Point::new(x, y)).collect();
        draw_polygon_mut(&mut frame, &poly, Rgb([240, 240, 240]));
        let mut det = detector(100, 50, 5);

        assert_eq!(det.process(&frame, 5, 50.0, 150.0), DetectionStatus::Accepted);

        let corners = det.corners().unwrap();
        for (found, &(x, y)) in corners.iter().zip(drawn.iter()) {
            assert!(
                (found[0] - x as f64).abs() <= 2.0 && (found[1] - y as f64).abs() <= 2.0,
                "corner {:?} too far from ({}, {})",
                found,
                x,
                y
            );
        }

        let center = det.geometry().unwrap().to_canonical([120.0, 70.0]).unwrap();
        assert!((center[0] - 50.0).abs() < 1.0 && (center[1] - 25.0).abs() < 1.0, "{:?}", center);
    }

    #[test]
    fn test_points_beyond_vanishing_line_are_rejected() {
        // Sides converge just above the top edge
        let trapezoid = [[90.0, 20.0], [110.0, 20.0], [200.0, 150.0], [0.0, 150.0]];
        let mut det = detector(100, 50, 5);
        assert_eq!(det.accept_corners(trapezoid), DetectionStatus::Accepted);
        let geometry = det.geometry().unwrap();

        let behind = [100.0, -50.0];
        assert!(geometry.homography.w(behind) * geometry.homography.w(trapezoid[0]) < 0.0);
        assert!(geometry.homography.project(behind).is_some());
        assert!(geometry.to_canonical(behind).is_none());

        assert!(geometry.to_canonical([100.0, 100.0]).is_some());
    }

    #[test]
    fn test_blank_frame_fails_softly() {
        let mut det = detector(200, 80, 8);
        let frame = paper_frame(&[(40, 30), (200, 40), (190, 150), (30, 140)]);
        assert_eq!(det.process(&frame, 5, 50.0, 150.0), DetectionStatus::Accepted);
        let before = det.geometry().unwrap().clone();

        let blank = RgbImage::from_pixel(240, 180, Rgb([20, 20, 20]));
        let status = det.process(&blank, 5, 50.0, 150.0);

        assert_eq!(status, DetectionStatus::Failed(DetectionFailure::NoContour));
        assert_eq!(det.geometry(), Some(&before));
    }

    #[test]
    fn test_mark_frozen_keeps_geometry() {
        let mut det = detector(100, 50, 5);
        det.accept_corners([[0.0, 0.0], [100.0, 0.0], [100.0, 50.0], [0.0, 50.0]]);
        let before = det.geometry().unwrap().clone();

        assert_eq!(det.mark_frozen(), DetectionStatus::Frozen);
        assert_eq!(det.geometry(), Some(&before));
    }
}
