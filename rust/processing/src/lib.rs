// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # TriFeather Processing
//!
//! Columnar tables for triangulated map geometry and dot-density points.
//!
//! - [`encode_features`] triangulates a feature collection and lays it out as
//!   a [`GeometryTable`]: a reserved coordinate row, one row per feature and
//!   one inferred column per property.
//! - [`dot_density`] turns per-feature counts into points spread over each
//!   feature's triangles in proportion to area, in shuffled row order.
//! - [`io`] persists either table as an Arrow IPC file or as Parquet.
//!
//! ```rust,ignore
//! use trifeather_processing::{dot_density, encode_features, io, DotDensityOptions, EncodeOptions};
//!
//! let table = encode_features(&collection, &EncodeOptions::default())?;
//! let feather = io::write_ipc(&table.to_record_batch()?)?;
//!
//! let options = DotDensityOptions::new(["white", "black"]).with_seed(7);
//! let points = dot_density(&table.collection, &options)?;
//! let parquet = io::write_parquet(&points.to_record_batch()?)?;
//! ```

pub mod allocator;
pub mod categories;
pub mod config;
pub mod error;
pub mod geometry_table;
pub mod infer;
pub mod io;
pub mod pipeline;
pub mod points;

pub use allocator::{
    allocate, checked_total, stochastic_round, target_count, DotDensity, DotDensityAllocator,
};
pub use categories::{CategoryColumn, CategoryEncoder, KeyWidth};
pub use config::{DotDensityOptions, EncodeOptions};
pub use error::{Error, Result};
pub use geometry_table::GeometryTable;
pub use infer::{ColumnType, TypeInferrer};
pub use pipeline::{dot_density, encode_features, encode_features_with};
pub use points::{OutputPermutation, PointArena, PointTable};
