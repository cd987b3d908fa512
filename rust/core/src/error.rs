// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading features and building the coordinate store
#[derive(Error, Debug)]
pub enum Error {
    #[error("All elements must be polygons or multipolygons, but feature {feature} is a {kind}")]
    UnsupportedGeometry { kind: String, feature: String },

    #[error("Malformed {kind} coordinates: {reason}")]
    MalformedGeometry { kind: String, reason: String },

    #[error("Invalid projection: {0}")]
    InvalidProjection(String),

    #[error("Can't convert {value} in column '{column}': no column type defined for this value")]
    UnsupportedPropertyType { column: String, value: String },

    #[error("Coordinate store overflow: more than {max} distinct coordinates", max = u32::MAX)]
    CoordinateOverflow,

    #[error("Coordinate buffer length {0} is not a multiple of 8 bytes")]
    InvalidCoordinateBuffer(usize),

    #[error("Coordinate {index} in the buffer repeats coordinate {first}")]
    DuplicateCoordinate { index: usize, first: u32 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
