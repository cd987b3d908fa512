// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during geometry encoding
#[derive(Error, Debug)]
pub enum Error {
    #[error("Triangulation failed: {0}")]
    TriangulationError(String),

    #[error("Vertex index span {0} does not fit a 32-bit resolution")]
    IndexSpanOverflow(u64),

    #[error("Local vertex index {index} does not fit a {bits}-bit resolution")]
    ResolutionOverflow { index: u32, bits: u8 },

    #[error("Unsupported coordinate resolution: {0} bits")]
    UnsupportedResolution(u8),

    #[error("Vertex buffer of {len} bytes is not a whole number of {bits}-bit triangles")]
    InvalidVertexBuffer { len: usize, bits: u8 },

    #[error("Coordinate index {0} is not in the coordinate store")]
    MissingCoordinate(u64),

    #[error("Core error: {0}")]
    CoreError(#[from] trifeather_core::Error),
}
