// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar area, centroid and bounds of projected polygons
//!
//! Rings are open (no closing duplicate). The first ring of a polygon is its
//! outer boundary and counts positive regardless of winding; every later ring
//! is a hole and counts negative.

/// An open ring of projected `f32` positions
pub type PlanarRing = Vec<[f32; 2]>;

/// Outer ring followed by holes
pub type PlanarPolygon = Vec<PlanarRing>;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Create new bounds initialized to invalid state
    pub fn empty() -> Self {
        Self {
            min_x: f64::MAX,
            min_y: f64::MAX,
            max_x: f64::MIN,
            max_y: f64::MIN,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    #[inline]
    pub fn expand(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// `[min_x, min_y, max_x, max_y]`
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn from_array(values: [f64; 4]) -> Self {
        Self {
            min_x: values[0],
            min_y: values[1],
            max_x: values[2],
            max_y: values[3],
        }
    }
}

/// Area, centroid and bounds of one feature's geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarMetrics {
    pub area: f64,
    pub centroid: (f64, f64),
    pub bounds: Bounds,
}

// Shoelace sums of a ring: (2 * signed area, x moment, y moment).
fn ring_moments(ring: &[[f32; 2]]) -> (f64, f64, f64) {
    let n = ring.len();
    if n < 3 {
        return (0.0, 0.0, 0.0);
    }
    let mut doubled = 0.0;
    let mut mx = 0.0;
    let mut my = 0.0;
    for i in 0..n {
        let [x0, y0] = ring[i];
        let [x1, y1] = ring[(i + 1) % n];
        let (x0, y0, x1, y1) = (x0 as f64, y0 as f64, x1 as f64, y1 as f64);
        let cross = x0 * y1 - x1 * y0;
        doubled += cross;
        mx += (x0 + x1) * cross;
        my += (y0 + y1) * cross;
    }
    (doubled, mx, my)
}

/// Signed area of an open ring (positive when counter-clockwise)
pub fn ring_area(ring: &[[f32; 2]]) -> f64 {
    ring_moments(ring).0 / 2.0
}

/// Area of a polygon: outer ring minus holes
pub fn polygon_area(polygon: &[PlanarRing]) -> f64 {
    let mut area = 0.0;
    for (i, ring) in polygon.iter().enumerate() {
        let a = ring_area(ring).abs();
        if i == 0 {
            area += a;
        } else {
            area -= a;
        }
    }
    area.abs()
}

impl PlanarMetrics {
    /// Measure a feature. Returns `None` when it has no positions at all.
    pub fn of(polygons: &[PlanarPolygon]) -> Option<Self> {
        let mut bounds = Bounds::empty();
        let mut area = 0.0;
        let mut weight = 0.0;
        let mut mx = 0.0;
        let mut my = 0.0;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut count = 0usize;

        for polygon in polygons {
            for ring in polygon {
                for &[x, y] in ring {
                    bounds.expand(x as f64, y as f64);
                    sum_x += x as f64;
                    sum_y += y as f64;
                    count += 1;
                }
            }

            for (i, ring) in polygon.iter().enumerate() {
                let (doubled, rx, ry) = ring_moments(ring);
                // Orient outer rings positive and holes negative.
                let sign = match (i == 0, doubled >= 0.0) {
                    (true, true) | (false, false) => 1.0,
                    _ => -1.0,
                };
                weight += sign * doubled;
                mx += sign * rx;
                my += sign * ry;
            }
            area += polygon_area(polygon);
        }

        if count == 0 {
            return None;
        }

        let centroid = if weight.abs() > f64::EPSILON {
            (mx / (3.0 * weight), my / (3.0 * weight))
        } else {
            (sum_x / count as f64, sum_y / count as f64)
        };

        Some(Self {
            area,
            centroid,
            bounds,
        })
    }
}
