// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TriFeather Geometry Processing
//!
//! Polygon triangulation with earcutr and compact, GPU-friendly vertex index
//! buffers that reference a shared coordinate store.

pub mod encoder;
pub mod error;
pub mod metrics;
pub mod triangle;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Vector2};

pub use encoder::{
    compact_indices, encode_polygons, EncodedCollection, EncodedFeature, EncodedGeometry,
    GeometryEncoder, Resolution, VertexBuffer,
};
pub use error::{Error, Result};
pub use metrics::{Bounds, PlanarMetrics};
pub use triangle::{decode_triangles, Triangle};
pub use triangulation::{triangulate_polygon, triangulate_polygon_with_holes};
