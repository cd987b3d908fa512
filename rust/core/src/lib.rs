// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # TriFeather Core
//!
//! Input model and shared coordinate table for triangulated map geometry.
//!
//! ## Overview
//!
//! - **Features**: GeoJSON-shaped [`FeatureCollection`]s of polygons and multipolygons
//!   whose coordinates are already planar
//! - **Projection**: the [`Projection`] seam applied before coordinates are rounded to `f32`
//! - **Coordinate store**: a [`CoordinateStore`] that deduplicates coordinates by their
//!   exact `f32` bit pattern and hands out stable sequential indices
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trifeather_core::{CoordinateStore, FeatureCollection};
//!
//! let collection = FeatureCollection::from_json(text)?;
//! let mut builder = CoordinateStore::builder();
//! for feature in &collection.features {
//!     if let Some(geometry) = &feature.geometry {
//!         for [x, y] in geometry.positions() {
//!             builder.insert(*x as f32, *y as f32)?;
//!         }
//!     }
//! }
//! let store = builder.build();
//! ```

pub mod coordinates;
pub mod error;
pub mod feature;
pub mod projection;

pub use coordinates::{CoordKey, CoordinateStore, CoordinateStoreBuilder};
pub use error::{Error, Result};
pub use feature::{Feature, FeatureCollection, FeatureId, Geometry, Polygon, Properties, Ring};
pub use projection::{Affine, Identity, Projection};
