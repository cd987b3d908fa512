// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entry points for the two passes.

use crate::allocator::{DotDensity, DotDensityAllocator};
use crate::config::{DotDensityOptions, EncodeOptions};
use crate::geometry_table::GeometryTable;
use crate::infer::TypeInferrer;
use crate::Result;
use trifeather_core::{FeatureCollection, Identity, Projection};
use trifeather_geometry::{EncodedCollection, GeometryEncoder};

/// Encode already-planar features into a geometry table.
pub fn encode_features(
    collection: &FeatureCollection,
    options: &EncodeOptions,
) -> Result<GeometryTable> {
    encode_features_with(collection, Identity, options)
}

/// Encode features, projecting every position first.
pub fn encode_features_with<P: Projection>(
    collection: &FeatureCollection,
    projection: P,
    options: &EncodeOptions,
) -> Result<GeometryTable> {
    options.validate()?;
    let encoded = GeometryEncoder::new(projection).encode(collection)?;
    let table = GeometryTable::new(encoded, &TypeInferrer::from_options(options))?;
    tracing::info!(
        features = table.len(),
        coordinates = table.collection.coordinates.len(),
        columns = table.columns.len(),
        "geometry table built"
    );
    Ok(table)
}

/// Generate a dot-density point set, seeded from `options.seed` when set.
pub fn dot_density(
    collection: &EncodedCollection,
    options: &DotDensityOptions,
) -> Result<DotDensity> {
    let mut rng = options.rng();
    DotDensityAllocator::new(options).run(collection, &mut rng)
}
