// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar projection seam
//!
//! Cartographic projections live outside this crate. Input is expected to be
//! planar already; [`Identity`] passes it through and [`Affine`] rescales it
//! (for example into pixel space) before coordinates are rounded to `f32`.

use crate::{Error, Result};

/// Maps an input position into the planar space used for encoding.
pub trait Projection: Send + Sync {
    /// Returns `None` when the position lies outside the projection's domain.
    fn project(&self, x: f64, y: f64) -> Option<(f64, f64)>;
}

/// Pass-through projection for already projected input
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Projection for Identity {
    #[inline]
    fn project(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        Some((x, y))
    }
}

/// Uniform scale followed by a translation
#[derive(Debug, Clone, Copy)]
pub struct Affine {
    scale: f64,
    translate: (f64, f64),
}

impl Affine {
    pub fn new(scale: f64, translate: (f64, f64)) -> Result<Self> {
        if !scale.is_finite() || scale == 0.0 {
            return Err(Error::InvalidProjection(format!(
                "scale must be finite and non-zero, got {}",
                scale
            )));
        }
        if !translate.0.is_finite() || !translate.1.is_finite() {
            return Err(Error::InvalidProjection(format!(
                "translation must be finite, got ({}, {})",
                translate.0, translate.1
            )));
        }
        Ok(Self { scale, translate })
    }
}

impl Projection for Affine {
    #[inline]
    fn project(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let px = x * self.scale + self.translate.0;
        let py = y * self.scale + self.translate.1;
        if px.is_finite() && py.is_finite() {
            Some((px, py))
        } else {
            None
        }
    }
}
