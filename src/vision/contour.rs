//! Contour selection and quadrilateral extraction
//!
//! Picks the dominant outline in an edge map, reduces it to a polygon and, when
//! that polygon is a usable quadrilateral, puts its corners in a stable order.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;

/// Outer contour with the largest enclosed area
pub fn largest_contour(edges: &GrayImage) -> Option<Vec<[f64; 2]>> {
    find_contours::<i32>(edges)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.points.len() >= 3)
        .map(|c| {
            let points: Vec<[f64; 2]> = c.points.iter().map(|p| [p.x as f64, p.y as f64]).collect();
            let area = polygon_area(&points);
            (points, area)
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(points, _)| points)
}

/// Douglas-Peucker approximation of a closed contour.
///
/// `epsilon_ratio` scales the tolerance with the contour perimeter. The
/// approximation always keeps its first point, so the contour is walked from
/// the point farthest from its centroid, which is a true corner. Repeated and
/// collinear vertices are merged afterwards.
pub fn approximate_polygon(contour: &[[f64; 2]], epsilon_ratio: f64) -> Vec<[f64; 2]> {
    if contour.len() < 3 {
        return contour.to_vec();
    }

    let center = centroid(contour);
    let start = (0..contour.len())
        .max_by(|&a, &b| distance(contour[a], center).total_cmp(&distance(contour[b], center)))
        .unwrap_or(0);

    let points: Vec<Point<f64>> = contour[start..]
        .iter()
        .chain(&contour[..start])
        .map(|p| Point::new(p[0], p[1]))
        .collect();
    let epsilon = (arc_length(&points, true) * epsilon_ratio).max(1e-6);

    let approx: Vec<[f64; 2]> = approximate_polygon_dp(&points, epsilon, true)
        .into_iter()
        .map(|p| [p.x, p.y])
        .collect();

    merge_collinear(approx, epsilon)
}

/// Drop duplicate vertices and vertices lying within `tolerance` of the line
/// through their neighbours, weakest first.
fn merge_collinear(mut polygon: Vec<[f64; 2]>, tolerance: f64) -> Vec<[f64; 2]> {
    polygon.dedup_by(|a, b| distance(*a, *b) < 1e-9);
    while polygon.len() > 1 && distance(polygon[0], polygon[polygon.len() - 1]) < 1e-9 {
        polygon.pop();
    }

    while polygon.len() > 3 {
        let n = polygon.len();
        let weakest = (0..n)
            .map(|i| {
                let prev = polygon[(i + n - 1) % n];
                let next = polygon[(i + 1) % n];
                (i, point_line_distance(polygon[i], prev, next))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match weakest {
            Some((i, d)) if d < tolerance => {
                polygon.remove(i);
            }
            _ => break,
        }
    }

    polygon
}

/// Sharpen the corners of an approximated quadrilateral.
///
/// Each side is replaced by a line fitted to the contour points along its
/// middle, and corners become the intersections of neighbouring lines. This
/// undoes the rounding that smoothing leaves at the corners. Lines are moved
/// `inset` pixels towards the middle of the quad to offset edge dilation.
/// Anything other than a 4-vertex polygon is returned unchanged, as is any
/// corner whose sides cannot be fitted.
pub fn refine_quad(contour: &[[f64; 2]], polygon: &[[f64; 2]], inset: f64) -> Vec<[f64; 2]> {
    let Ok(quad) = <[[f64; 2]; 4]>::try_from(polygon) else {
        return polygon.to_vec();
    };
    let center = centroid(&quad);

    let lines: Vec<Option<Line>> = (0..4)
        .map(|i| fit_side(contour, quad[i], quad[(i + 1) % 4], center, inset))
        .collect();

    (0..4)
        .map(|i| {
            let before = lines[(i + 3) % 4];
            let after = lines[i];
            let refined = match (before, after) {
                (Some(a), Some(b)) => a.intersect(&b),
                _ => None,
            };
            // Reject wild intersections from nearly parallel sides
            let limit = 0.25 * distance(quad[i], quad[(i + 1) % 4]).min(distance(quad[i], quad[(i + 3) % 4]));
            match refined {
                Some(p) if distance(p, quad[i]) <= limit => p,
                _ => quad[i],
            }
        })
        .collect()
}

/// Line `normal . p = offset` with a unit normal
#[derive(Debug, Clone, Copy)]
struct Line {
    normal: [f64; 2],
    offset: f64,
}

impl Line {
    fn intersect(&self, other: &Line) -> Option<[f64; 2]> {
        let [a1, b1] = self.normal;
        let [a2, b2] = other.normal;
        let det = a1 * b2 - b1 * a2;
        if det.abs() < 1e-9 {
            return None;
        }
        let x = (self.offset * b2 - other.offset * b1) / det;
        let y = (a1 * other.offset - a2 * self.offset) / det;
        (x.is_finite() && y.is_finite()).then_some([x, y])
    }
}

/// Total least squares line through the contour points lying along the middle
/// of side `a -> b`
fn fit_side(contour: &[[f64; 2]], a: [f64; 2], b: [f64; 2], center: [f64; 2], inset: f64) -> Option<Line> {
    let length = distance(a, b);
    if length < 1e-9 {
        return None;
    }
    let dir = [(b[0] - a[0]) / length, (b[1] - a[1]) / length];
    let tolerance = (0.1 * length).max(4.0);

    let side: Vec<[f64; 2]> = contour
        .iter()
        .copied()
        .filter(|p| {
            let rel = [p[0] - a[0], p[1] - a[1]];
            let t = (rel[0] * dir[0] + rel[1] * dir[1]) / length;
            let off = (rel[0] * dir[1] - rel[1] * dir[0]).abs();
            (0.15..=0.85).contains(&t) && off <= tolerance
        })
        .collect();
    if side.len() < 3 {
        return None;
    }

    let mean = centroid(&side);
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in &side {
        let (dx, dy) = (p[0] - mean[0], p[1] - mean[1]);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let angle = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let normal = [-angle.sin(), angle.cos()];
    let mut offset = normal[0] * mean[0] + normal[1] * mean[1];

    let center_offset = normal[0] * center[0] + normal[1] * center[1];
    if center_offset > offset {
        offset += inset;
    } else {
        offset -= inset;
    }
    Some(Line { normal, offset })
}

/// Order four corners as top-left, top-right, bottom-right, bottom-left.
///
/// Top-left has the smallest `x + y`, bottom-right the largest; top-right has
/// the smallest `y - x`, bottom-left the largest. Ties are broken on the raw
/// coordinates so the result does not depend on the input order. Returns
/// `None` when the rule does not single out four distinct corners.
pub fn order_corners(points: &[[f64; 2]; 4]) -> Option<[[f64; 2]; 4]> {
    let pick = |key: fn(&[f64; 2]) -> f64, largest: bool| -> usize {
        let cmp = |a: &usize, b: &usize| {
            let (pa, pb) = (&points[*a], &points[*b]);
            key(pa)
                .total_cmp(&key(pb))
                .then(pa[0].total_cmp(&pb[0]))
                .then(pa[1].total_cmp(&pb[1]))
        };
        let indices = 0..points.len();
        let best = if largest {
            indices.max_by(cmp)
        } else {
            indices.min_by(cmp)
        };
        best.unwrap_or(0)
    };

    let sum = |p: &[f64; 2]| p[0] + p[1];
    let diff = |p: &[f64; 2]| p[1] - p[0];

    let tl = pick(sum, false);
    let br = pick(sum, true);
    let tr = pick(diff, false);
    let bl = pick(diff, true);

    let picked = [tl, tr, br, bl];
    let distinct = (0..4).all(|i| (i + 1..4).all(|j| picked[i] != picked[j]));
    if !distinct {
        return None;
    }
    Some(picked.map(|i| points[i]))
}

/// Absolute area of a simple polygon (shoelace formula)
pub fn polygon_area(points: &[[f64; 2]]) -> f64 {
    signed_area(points).abs()
}

fn signed_area(points: &[[f64; 2]]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a[0] * b[1] - b[0] * a[1]
        })
        .sum();
    twice / 2.0
}

/// Whether an ordered quadrilateral is strictly convex.
///
/// Self-intersecting ("bow-tie") and collapsed quads fail this check.
pub fn is_convex_quad(corners: &[[f64; 2]; 4]) -> bool {
    let mut sign = 0.0f64;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        let c = corners[(i + 2) % 4];
        let cross = (b[0] - a[0]) * (c[1] - b[1]) - (b[1] - a[1]) * (c[0] - b[0]);
        if cross.abs() < 1e-9 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

fn centroid(points: &[[f64; 2]]) -> [f64; 2] {
    let n = points.len().max(1) as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
    [sx / n, sy / n]
}

fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

fn point_line_distance(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let len = distance(a, b);
    if len < 1e-12 {
        return distance(p, a);
    }
    ((b[0] - a[0]) * (a[1] - p[1]) - (a[0] - p[0]) * (b[1] - a[1])).abs() / len
}
