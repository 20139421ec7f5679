//! Key region layout in the canonical paper rectangle

/// Axis along which keys are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutAxis {
    /// Keys run left to right
    Horizontal,
    /// Keys run top to bottom (portrait paper)
    Vertical,
}

/// One key of the printed keyboard, in canonical coordinates.
///
/// Regions are half-open on their far edge so neighbours never overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyRegion {
    /// Position of the key along the keyboard
    pub index: usize,
    /// Top-left corner
    pub min: [f64; 2],
    /// Bottom-right corner
    pub max: [f64; 2],
}

impl KeyRegion {
    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    /// Center point of the key
    pub fn center(&self) -> [f64; 2] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
        ]
    }

    /// Corners in TL, TR, BR, BL order
    pub fn corners(&self) -> [[f64; 2]; 4] {
        [
            self.min,
            [self.max[0], self.min[1]],
            self.max,
            [self.min[0], self.max[1]],
        ]
    }

    /// Whether a point lies inside the key (far edges excluded)
    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min[0] && p[0] < self.max[0] && p[1] >= self.min[1] && p[1] < self.max[1]
    }

    /// Planar distance from a point to the key rectangle, 0 when inside or on
    /// its border
    pub fn distance_to(&self, p: [f64; 2]) -> f64 {
        let dx = (self.min[0] - p[0]).max(0.0).max(p[0] - self.max[0]);
        let dy = (self.min[1] - p[1]).max(0.0).max(p[1] - self.max[1]);
        dx.hypot(dy)
    }
}

/// Axis the keyboard runs along for a canonical rectangle
pub fn layout_axis(width: f64, height: f64) -> LayoutAxis {
    if width >= height {
        LayoutAxis::Horizontal
    } else {
        LayoutAxis::Vertical
    }
}

/// Split the canonical rectangle into `key_count` equal keys along its long
/// axis, indexed from the origin side.
pub fn uniform_key_regions(width: f64, height: f64, key_count: usize) -> Vec<KeyRegion> {
    if key_count == 0 || width <= 0.0 || height <= 0.0 {
        return Vec::new();
    }

    let axis = layout_axis(width, height);
    let span = match axis {
        LayoutAxis::Horizontal => width,
        LayoutAxis::Vertical => height,
    };
    let edge = |i: usize| span * i as f64 / key_count as f64;

    (0..key_count)
        .map(|index| {
            let (start, end) = (edge(index), edge(index + 1));
            match axis {
                LayoutAxis::Horizontal => KeyRegion {
                    index,
                    min: [start, 0.0],
                    max: [end, height],
                },
                LayoutAxis::Vertical => KeyRegion {
                    index,
                    min: [0.0, start],
                    max: [width, end],
                },
            }
        })
        .collect()
}
