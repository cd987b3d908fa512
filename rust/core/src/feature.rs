// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GeoJSON-shaped input features
//!
//! Only `Polygon` and `MultiPolygon` geometries can be encoded. Other geometry
//! types are still parsed (as [`Geometry::Unsupported`]) so the encoder can report
//! which feature broke the pass instead of failing somewhere inside serde.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt;

/// A closed ring of planar positions. GeoJSON repeats the first position at the end.
pub type Ring = Vec<[f64; 2]>;

/// Outer ring followed by zero or more holes
pub type Polygon = Vec<Ring>;

/// Feature properties, keyed by column name
pub type Properties = Map<String, Value>;

/// A GeoJSON FeatureCollection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Wrap already-built features
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Parse GeoJSON text, flattening nested property values to JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut collection: FeatureCollection = serde_json::from_str(text)?;
        for feature in &mut collection.features {
            feature.flatten_properties();
        }
        Ok(collection)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// GeoJSON feature ids may be strings or numbers
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Text(s) => f.write_str(s),
            FeatureId::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A single input feature
#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub id: Option<FeatureId>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Properties,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

impl Feature {
    pub fn new(geometry: Option<Geometry>) -> Self {
        Self {
            id: None,
            properties: Properties::new(),
            geometry,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(FeatureId::Text(id.into()));
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Feature id as text, falling back to `Feature_no_{number}` (one-based).
    pub fn id_or_numbered(&self, number: usize) -> String {
        match &self.id {
            Some(id) => id.to_string(),
            None => format!("Feature_no_{}", number),
        }
    }

    /// Replace nested objects and arrays with their JSON text.
    pub fn flatten_properties(&mut self) {
        for value in self.properties.values_mut() {
            if value.is_object() || value.is_array() {
                *value = Value::String(value.to_string());
            }
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Properties, D::Error> {
    Ok(Option::<Properties>::deserialize(deserializer)?.unwrap_or_default())
}

/// Feature geometry
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawGeometry")]
pub enum Geometry {
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
    /// Any other GeoJSON geometry type; rejected by the encoder
    Unsupported { kind: String },
}

impl Geometry {
    /// GeoJSON type name
    pub fn kind(&self) -> &str {
        match self {
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::Unsupported { kind } => kind,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Geometry::Unsupported { .. })
    }

    /// Polygons of this geometry; empty for unsupported kinds
    pub fn polygons(&self) -> &[Polygon] {
        match self {
            Geometry::Polygon(polygon) => std::slice::from_ref(polygon),
            Geometry::MultiPolygon(polygons) => polygons,
            Geometry::Unsupported { .. } => &[],
        }
    }

    /// Every position of every ring, in input order
    pub fn positions(&self) -> impl Iterator<Item = &[f64; 2]> + '_ {
        self.polygons().iter().flatten().flatten()
    }
}

#[derive(Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

impl TryFrom<RawGeometry> for Geometry {
    type Error = Error;

    fn try_from(raw: RawGeometry) -> Result<Self> {
        match raw.kind.as_str() {
            "Polygon" => {
                let rings: Vec<Vec<Vec<f64>>> = parse_coordinates(&raw.kind, raw.coordinates)?;
                Ok(Geometry::Polygon(to_polygon(&raw.kind, rings)?))
            }
            "MultiPolygon" => {
                let polygons: Vec<Vec<Vec<Vec<f64>>>> =
                    parse_coordinates(&raw.kind, raw.coordinates)?;
                let polygons = polygons
                    .into_iter()
                    .map(|rings| to_polygon(&raw.kind, rings))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Geometry::MultiPolygon(polygons))
            }
            _ => Ok(Geometry::Unsupported { kind: raw.kind }),
        }
    }
}

fn parse_coordinates<T: serde::de::DeserializeOwned>(kind: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::MalformedGeometry {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

// Positions may carry an altitude; only x and y are kept.
fn to_polygon(kind: &str, rings: Vec<Vec<Vec<f64>>>) -> Result<Polygon> {
    rings
        .into_iter()
        .map(|ring| {
            ring.into_iter()
                .map(|position| match position.as_slice() {
                    [x, y, ..] => Ok([*x, *y]),
                    _ => Err(Error::MalformedGeometry {
                        kind: kind.to_string(),
                        reason: format!("position with {} values", position.len()),
                    }),
                })
                .collect()
        })
        .collect()
}
