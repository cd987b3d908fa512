// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dot-density allocation.
//!
//! Every (feature, category) pair gets an integer target, the count divided
//! by `points_represent` and stochastically rounded. The target is spread
//! over the feature's triangles in proportion to area, visiting triangles in
//! their stored triangulation order, and each point is drawn uniformly
//! inside its triangle.
//!
//! The allocation loop hands the last positive-area triangle everything that
//! is left, so the points placed for a pair always add up to its target.

use crate::categories::{CategoryColumn, CategoryEncoder};
use crate::config::DotDensityOptions;
use crate::infer::{value_as_count, value_as_text};
use crate::points::{PointArena, PointTable};
use crate::{Error, Result};
use arrow::record_batch::RecordBatch;
use rand::Rng;
use rayon::prelude::*;
use trifeather_geometry::{decode_triangles, EncodedCollection, EncodedFeature, Triangle};

/// Round `value` down or up at random, up with probability equal to its
/// fractional part. The expected result is `value`.
pub fn stochastic_round<R: Rng + ?Sized>(value: f64, rng: &mut R) -> f64 {
    let floor = value.floor();
    let fraction = value - floor;
    if fraction > 0.0 && rng.gen::<f64>() < fraction {
        floor + 1.0
    } else {
        floor
    }
}

/// Number of points for a raw count. Missing, negative and non-finite
/// counts give zero.
pub fn target_count<R: Rng + ?Sized>(raw: Option<f64>, points_represent: f64, rng: &mut R) -> u64 {
    let Some(raw) = raw else {
        return 0;
    };
    let scaled = raw / points_represent;
    if !scaled.is_finite() || scaled <= 0.0 {
        return 0;
    }
    stochastic_round(scaled, rng) as u64
}

/// Split per-category targets over triangles.
///
/// Returns one row per triangle with one count per category. Degenerate
/// triangles are skipped and get zero for every category.
pub fn allocate<R: Rng + ?Sized>(
    triangles: &[Triangle],
    targets: &[u64],
    rng: &mut R,
) -> Vec<Vec<u64>> {
    let mut allocated = vec![vec![0u64; targets.len()]; triangles.len()];
    let last_positive = triangles.iter().rposition(|t| !t.is_degenerate());
    let total_area: f64 = triangles
        .iter()
        .filter(|t| !t.is_degenerate())
        .map(|t| t.double_area)
        .sum();

    for (category, &target) in targets.iter().enumerate() {
        if target == 0 {
            continue;
        }
        let Some(last_positive) = last_positive else {
            tracing::warn!(category, target, "no triangle with positive area, points dropped");
            continue;
        };

        let mut remaining_target = target;
        let mut remaining_area = total_area;
        for (i, triangle) in triangles.iter().enumerate() {
            if triangle.is_degenerate() {
                continue;
            }
            let area = triangle.double_area;
            if remaining_target == 0 {
                break;
            }

            let mut share = if i == last_positive { 1.0 } else { area / remaining_area };
            if !share.is_finite() || share < 0.0 {
                tracing::warn!(
                    category,
                    triangle = i,
                    share,
                    remaining_area,
                    "invalid allocation share, treated as zero"
                );
                share = 0.0;
            }
            let share = share.min(1.0);

            let count = stochastic_round(remaining_target as f64 * share, rng) as u64;
            let count = count.min(remaining_target);
            allocated[i][category] += count;
            remaining_target -= count;
            remaining_area -= area;
        }
    }
    allocated
}

/// Sum of every target, `None` if it does not fit in a `u64`
pub fn checked_total(targets: &[Vec<u64>]) -> Option<u64> {
    targets
        .iter()
        .flatten()
        .try_fold(0u64, |total, &target| total.checked_add(target))
}

/// Output of a dot-density pass
#[derive(Debug, Clone)]
pub struct DotDensity {
    pub points: PointTable,
    /// Target per feature (rows) and category (columns)
    pub targets: Vec<Vec<u64>>,
    pub categories: Vec<CategoryColumn>,
}

impl DotDensity {
    /// Number of points, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        checked_total(&self.targets).unwrap_or(u64::MAX)
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        self.points.to_record_batch(&self.categories)
    }
}

/// Two-pass point generator: targets first, then points into a pre-sized arena.
pub struct DotDensityAllocator<'a> {
    options: &'a DotDensityOptions,
}

impl<'a> DotDensityAllocator<'a> {
    pub fn new(options: &'a DotDensityOptions) -> Self {
        Self { options }
    }

    pub fn run<R: Rng + ?Sized>(
        &self,
        collection: &EncodedCollection,
        rng: &mut R,
    ) -> Result<DotDensity> {
        self.options.validate()?;
        let encoder =
            CategoryEncoder::new(self.options.names.clone(), self.options.delimiter.clone());
        let categories = encoder.encode(&self.options.fields)?;

        // Pass one: triangles and targets. Decoding only reads the shared
        // store, so it runs per feature in parallel.
        let triangles: Vec<Vec<Triangle>> = collection
            .features
            .par_iter()
            .map(|feature| match &feature.geometry {
                Some(geometry) => decode_triangles(geometry, &collection.coordinates),
                None => Ok(Vec::new()),
            })
            .collect::<std::result::Result<_, _>>()?;

        let mut targets = Vec::with_capacity(collection.len());
        for (feature, feature_triangles) in collection.features.iter().zip(&triangles) {
            let placeable = feature_triangles.iter().any(|t| !t.is_degenerate());
            let row: Vec<u64> = self
                .options
                .fields
                .iter()
                .map(|field| {
                    if !placeable {
                        return 0;
                    }
                    let raw = feature.properties.get(field).and_then(value_as_count);
                    target_count(raw, self.options.points_represent, rng)
                })
                .collect();
            targets.push(row);
        }

        let total = checked_total(&targets).ok_or_else(|| {
            Error::InvalidConfig("total point count overflows a 64-bit integer".into())
        })?;
        let total = usize::try_from(total)
            .map_err(|_| Error::InvalidConfig(format!("{} points do not fit in memory", total)))?;
        tracing::info!(
            features = collection.len(),
            categories = self.options.fields.len(),
            points = total,
            "dot density targets computed"
        );

        // Pass two: place points
        let mut arena = PointArena::new(total, self.options.keep.clone(), rng)?;
        let rows = collection.features.iter().zip(&triangles).zip(&targets);
        for ((feature, feature_triangles), row) in rows {
            if row.iter().all(|&t| t == 0) {
                continue;
            }
            let keep = self.keep_values(feature);
            let allocation = allocate(feature_triangles, row, rng);
            for (triangle, counts) in feature_triangles.iter().zip(&allocation) {
                for (label, &count) in counts.iter().enumerate() {
                    for _ in 0..count {
                        let p = triangle.sample_point(rng);
                        arena.push(p.x as f32, p.y as f32, label as u16, &keep)?;
                    }
                }
            }
            let placed: u64 = row.iter().sum();
            tracing::debug!(feature = %feature.id, points = placed, "feature placed");
        }

        let points = arena.finish()?;
        Ok(DotDensity {
            points,
            targets,
            categories,
        })
    }

    // A keep column reads the feature property of that name; `id` falls back
    // to the feature id.
    fn keep_values(&self, feature: &EncodedFeature) -> Vec<Option<String>> {
        self.options
            .keep
            .iter()
            .map(|name| match feature.properties.get(name) {
                Some(value) => value_as_text(value),
                None if name == "id" => Some(feature.id.clone()),
                None => None,
            })
            .collect()
    }
}
