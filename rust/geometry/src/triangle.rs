// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangles rebuilt from an encoded vertex buffer

use crate::encoder::EncodedGeometry;
use crate::{Error, Point2, Result};
use rand::Rng;
use trifeather_core::CoordinateStore;

/// A triangle with its unsigned doubled area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Point2<f64>,
    pub b: Point2<f64>,
    pub c: Point2<f64>,
    pub double_area: f64,
}

impl Triangle {
    pub fn new(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> Self {
        let double_area = (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y)).abs();
        Self {
            a,
            b,
            c,
            double_area,
        }
    }

    /// No area to place points into. NaN areas count as degenerate.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.double_area.is_nan() || self.double_area <= 0.0
    }

    /// Uniform random point inside the triangle.
    ///
    /// Draws a point in the parallelogram spanned by `b - a` and `c - a` and
    /// folds the half outside the triangle back onto it.
    pub fn sample_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Point2<f64> {
        let mut u1: f64 = rng.gen();
        let mut u2: f64 = rng.gen();
        if u1 + u2 > 1.0 {
            u1 = 1.0 - u1;
            u2 = 1.0 - u2;
        }
        self.a + (self.b - self.a) * u1 + (self.c - self.a) * u2
    }
}

/// Rebuild a feature's triangles, in stored order, from the shared store.
pub fn decode_triangles(
    geometry: &EncodedGeometry,
    store: &CoordinateStore,
) -> Result<Vec<Triangle>> {
    let offset = geometry.buffer_offset as u64;
    let corner = |local: u32| -> Result<Point2<f64>> {
        let global = local as u64 + offset;
        let index = u32::try_from(global).map_err(|_| Error::MissingCoordinate(global))?;
        let (x, y) = store
            .coordinate(index)
            .ok_or(Error::MissingCoordinate(global))?;
        Ok(Point2::new(x as f64, y as f64))
    };

    geometry
        .vertices
        .triangles()
        .map(|[a, b, c]| Ok(Triangle::new(corner(a)?, corner(b)?, corner(c)?)))
        .collect()
}
