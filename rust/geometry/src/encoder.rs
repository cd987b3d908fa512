// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangulated, resolution-compacted feature encoding
//!
//! Each feature's triangles are stored as indices into the shared
//! [`CoordinateStore`]. Indices are rebased on the smallest index the feature
//! references (`buffer_offset`) so that most features fit in 8 or 16 bits.
//! A consumer recovers a global index as `local + buffer_offset`.

use crate::metrics::{Bounds, PlanarMetrics, PlanarPolygon, PlanarRing};
use crate::triangulation::{open_ring, triangulate_polygon_with_holes};
use crate::{Error, Point2, Result};
use rayon::prelude::*;
use trifeather_core::{
    CoordinateStore, Feature, FeatureCollection, Geometry, Identity, Projection, Properties,
};

/// Width of one stored vertex index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resolution {
    U8,
    U16,
    U32,
}

impl Resolution {
    /// Smallest width that holds every index in `0..=span`.
    pub fn for_span(span: u64) -> Result<Self> {
        if span < 1 << 8 {
            Ok(Resolution::U8)
        } else if span < 1 << 16 {
            Ok(Resolution::U16)
        } else if span < 1 << 32 {
            Ok(Resolution::U32)
        } else {
            Err(Error::IndexSpanOverflow(span))
        }
    }

    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            8 => Ok(Resolution::U8),
            16 => Ok(Resolution::U16),
            32 => Ok(Resolution::U32),
            other => Err(Error::UnsupportedResolution(other)),
        }
    }

    #[inline]
    pub fn bits(self) -> u8 {
        match self {
            Resolution::U8 => 8,
            Resolution::U16 => 16,
            Resolution::U32 => 32,
        }
    }

    #[inline]
    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }
}

/// Little-endian packed triangle list of local vertex indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBuffer {
    resolution: Resolution,
    bytes: Vec<u8>,
}

impl VertexBuffer {
    /// Pack local indices; fails if any index does not fit `resolution`.
    pub fn encode(locals: &[u32], resolution: Resolution) -> Result<Self> {
        let mut bytes = Vec::with_capacity(locals.len() * resolution.bytes());
        let overflow = |index: u32| Error::ResolutionOverflow {
            index,
            bits: resolution.bits(),
        };
        for &local in locals {
            match resolution {
                Resolution::U8 => {
                    bytes.push(u8::try_from(local).map_err(|_| overflow(local))?);
                }
                Resolution::U16 => {
                    let v = u16::try_from(local).map_err(|_| overflow(local))?;
                    bytes.extend_from_slice(&v.to_le_bytes());
                }
                Resolution::U32 => bytes.extend_from_slice(&local.to_le_bytes()),
            }
        }
        Ok(Self { resolution, bytes })
    }

    /// Wrap a packed buffer read back from storage.
    pub fn from_bytes(resolution: Resolution, bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() % (resolution.bytes() * 3) != 0 {
            return Err(Error::InvalidVertexBuffer {
                len: bytes.len(),
                bits: resolution.bits(),
            });
        }
        Ok(Self { resolution, bytes })
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of stored indices (three per triangle)
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len() / self.resolution.bytes()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.len() / 3
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<u32> {
        let width = self.resolution.bytes();
        let chunk = self.bytes.get(i * width..(i + 1) * width)?;
        Some(match self.resolution {
            Resolution::U8 => chunk[0] as u32,
            Resolution::U16 => u16::from_le_bytes([chunk[0], chunk[1]]) as u32,
            Resolution::U32 => u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        (0..self.triangle_count()).filter_map(move |t| {
            Some([self.get(t * 3)?, self.get(t * 3 + 1)?, self.get(t * 3 + 2)?])
        })
    }
}

/// Compact global indices around their minimum.
///
/// Returns the packed buffer and the offset to add back. An empty index list
/// encodes as an empty 8-bit buffer with offset 0.
pub fn compact_indices(globals: &[u32]) -> Result<(VertexBuffer, u32)> {
    let (Some(&min), Some(&max)) = (globals.iter().min(), globals.iter().max()) else {
        return Ok((VertexBuffer::encode(&[], Resolution::U8)?, 0));
    };
    let resolution = Resolution::for_span((max - min) as u64)?;
    let locals: Vec<u32> = globals.iter().map(|g| g - min).collect();
    Ok((VertexBuffer::encode(&locals, resolution)?, min))
}

/// One feature's encoded geometry
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedGeometry {
    pub vertices: VertexBuffer,
    /// Smallest global coordinate index referenced by the feature
    pub buffer_offset: u32,
    pub bounds: Bounds,
    pub centroid: (f64, f64),
    /// Planar area in projected units
    pub area: f64,
}

impl EncodedGeometry {
    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.vertices.resolution()
    }

    /// Global coordinate indices, in stored triangle order
    pub fn global_indices(&self) -> impl Iterator<Item = u64> + '_ {
        let offset = self.buffer_offset as u64;
        self.vertices.iter().map(move |local| local as u64 + offset)
    }
}

/// A feature after encoding. `geometry` is `None` for null or failed geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeature {
    pub id: String,
    pub properties: Properties,
    pub geometry: Option<EncodedGeometry>,
}

/// The output of one encoding pass
#[derive(Debug, Clone, Default)]
pub struct EncodedCollection {
    pub coordinates: CoordinateStore,
    pub features: Vec<EncodedFeature>,
}

impl EncodedCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Extent of every stored coordinate, `None` for an empty store
    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds = Bounds::empty();
        for key in self.coordinates.keys() {
            bounds.expand(key.x() as f64, key.y() as f64);
        }
        bounds.is_valid().then_some(bounds)
    }
}

/// Triangulates features and compacts their vertex indices
pub struct GeometryEncoder<P: Projection = Identity> {
    projection: P,
}

impl Default for GeometryEncoder<Identity> {
    fn default() -> Self {
        Self::new(Identity)
    }
}

impl<P: Projection> GeometryEncoder<P> {
    pub fn new(projection: P) -> Self {
        Self { projection }
    }

    /// Encode a whole collection.
    ///
    /// Fails on the first geometry that is neither a Polygon nor a MultiPolygon.
    /// Null geometry, positions outside the projection and triangulation
    /// failures only null out the affected feature.
    pub fn encode(&self, collection: &FeatureCollection) -> Result<EncodedCollection> {
        for (i, feature) in collection.features.iter().enumerate() {
            if let Some(geometry) = &feature.geometry {
                if !geometry.is_supported() {
                    return Err(trifeather_core::Error::UnsupportedGeometry {
                        kind: geometry.kind().to_string(),
                        feature: feature.id_or_numbered(i + 1),
                    }
                    .into());
                }
            }
        }

        let projected: Vec<Option<Vec<PlanarPolygon>>> = collection
            .features
            .iter()
            .enumerate()
            .map(|(i, feature)| self.project_feature(feature, i + 1))
            .collect();

        // Coordinates are indexed in input order so the store is deterministic.
        let mut builder = CoordinateStore::builder();
        for polygons in projected.iter().flatten() {
            for &[x, y] in polygons.iter().flatten().flatten() {
                builder.insert(x, y)?;
            }
        }
        let coordinates = builder.build();
        tracing::debug!(
            features = collection.len(),
            coordinates = coordinates.len(),
            "Built coordinate store"
        );

        let features = collection
            .features
            .par_iter()
            .zip(projected.par_iter())
            .enumerate()
            .map(|(i, (feature, polygons))| {
                let id = feature.id_or_numbered(i + 1);
                let geometry = match polygons {
                    None => None,
                    Some(polygons) => match encode_polygons(polygons, &coordinates) {
                        Ok(geometry) => geometry,
                        Err(Error::TriangulationError(reason)) => {
                            tracing::warn!(
                                feature = %id,
                                %reason,
                                "Triangulation failed, storing null geometry"
                            );
                            None
                        }
                        Err(e) => return Err(e),
                    },
                };
                Ok(EncodedFeature {
                    id,
                    properties: feature.properties.clone(),
                    geometry,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let null_count = features.iter().filter(|f| f.geometry.is_none()).count();
        tracing::info!(
            features = features.len(),
            null_geometries = null_count,
            coordinates = coordinates.len(),
            "Encoded feature collection"
        );

        Ok(EncodedCollection {
            coordinates,
            features,
        })
    }

    // Project and round to f32; `None` for null geometry or any position the
    // projection cannot handle.
    fn project_feature(&self, feature: &Feature, number: usize) -> Option<Vec<PlanarPolygon>> {
        let geometry: &Geometry = feature.geometry.as_ref()?;
        let mut polygons = Vec::with_capacity(geometry.polygons().len());
        for polygon in geometry.polygons() {
            let mut rings = Vec::with_capacity(polygon.len());
            for ring in polygon {
                let mut planar: PlanarRing = Vec::with_capacity(ring.len());
                for &[x, y] in open_ring(ring) {
                    match self.projection.project(x, y) {
                        Some((px, py)) => planar.push([px as f32, py as f32]),
                        None => {
                            tracing::warn!(
                                feature = %feature.id_or_numbered(number),
                                x, y,
                                "Position outside projection, storing null geometry"
                            );
                            return None;
                        }
                    }
                }
                rings.push(planar);
            }
            polygons.push(rings);
        }
        Some(polygons)
    }
}

/// Encode one feature's projected polygons against a built store.
///
/// Returns `Ok(None)` if the feature has no positions at all.
pub fn encode_polygons(
    polygons: &[PlanarPolygon],
    coordinates: &CoordinateStore,
) -> Result<Option<EncodedGeometry>> {
    let Some(metrics) = PlanarMetrics::of(polygons) else {
        return Ok(None);
    };

    let mut globals = Vec::new();
    for polygon in polygons {
        let Some((outer, holes)) = polygon.split_first() else {
            continue;
        };
        // Degenerate outer rings contribute no triangles.
        if outer.len() < 3 {
            continue;
        }
        let holes: Vec<&PlanarRing> = holes.iter().filter(|h| h.len() >= 3).collect();

        let positions: Vec<[f32; 2]> = outer
            .iter()
            .chain(holes.iter().copied().flatten())
            .copied()
            .collect();
        let to_points = |ring: &PlanarRing| -> Vec<Point2<f64>> {
            ring.iter()
                .map(|&[x, y]| Point2::new(x as f64, y as f64))
                .collect()
        };
        let hole_points: Vec<Vec<Point2<f64>>> = holes.iter().map(|&h| to_points(h)).collect();

        let indices = triangulate_polygon_with_holes(&to_points(outer), &hole_points)?;
        globals.reserve(indices.len());
        for i in indices {
            let &[x, y] = positions
                .get(i)
                .ok_or_else(|| Error::TriangulationError(format!("index {} outside the ring", i)))?;
            let global = coordinates
                .lookup(x, y)
                .ok_or(Error::MissingCoordinate(i as u64))?;
            globals.push(global);
        }
    }

    let (vertices, buffer_offset) = compact_indices(&globals)?;
    Ok(Some(EncodedGeometry {
        vertices,
        buffer_offset,
        bounds: metrics.bounds,
        centroid: metrics.centroid,
        area: metrics.area,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;
    use trifeather_core::{Affine, Geometry};

    fn square(x: f64, y: f64, size: f64) -> Vec<[f64; 2]> {
        vec![
            [x, y],
            [x + size, y],
            [x + size, y + size],
            [x, y + size],
            [x, y],
        ]
    }

    fn polygon_feature(rings: Vec<Vec<[f64; 2]>>) -> Feature {
        Feature::new(Some(Geometry::Polygon(rings)))
    }

    #[test]
    fn test_resolution_boundaries() {
        assert_eq!(Resolution::for_span(0).unwrap(), Resolution::U8);
        assert_eq!(Resolution::for_span(255).unwrap(), Resolution::U8);
        assert_eq!(Resolution::for_span(256).unwrap(), Resolution::U16);
        assert_eq!(Resolution::for_span(65_535).unwrap(), Resolution::U16);
        assert_eq!(Resolution::for_span(65_536).unwrap(), Resolution::U32);
        assert_eq!(Resolution::for_span(u32::MAX as u64).unwrap(), Resolution::U32);
        assert!(matches!(
            Resolution::for_span(1 << 32),
            Err(Error::IndexSpanOverflow(_))
        ));
        assert!(Resolution::from_bits(24).is_err());
    }

    #[test]
    fn test_compact_span_of_256_selects_16_bit() {
        let (buffer, offset) = compact_indices(&[10, 266, 11]).unwrap();
        assert_eq!(offset, 10);
        assert_eq!(buffer.resolution(), Resolution::U16);
        assert_eq!(buffer.iter().collect::<Vec<_>>(), vec![0, 256, 1]);

        let (buffer, _) = compact_indices(&[10, 265, 11]).unwrap();
        assert_eq!(buffer.resolution(), Resolution::U8);
    }

    #[test]
    fn test_vertex_buffer_rejects_overflow() {
        assert!(matches!(
            VertexBuffer::encode(&[0, 256, 1], Resolution::U8),
            Err(Error::ResolutionOverflow { index: 256, bits: 8 })
        ));
        assert!(VertexBuffer::from_bytes(Resolution::U16, vec![0; 5]).is_err());
        assert!(VertexBuffer::from_bytes(Resolution::U16, vec![0; 6]).is_ok());
    }

    #[test]
    fn test_encode_shares_coordinates() {
        // Two squares sharing an edge: 6 distinct coordinates.
        let collection = FeatureCollection::new(vec![
            polygon_feature(vec![square(0.0, 0.0, 1.0)]).with_id("left"),
            polygon_feature(vec![square(1.0, 0.0, 1.0)]).with_id("right"),
        ]);
        let encoded = GeometryEncoder::default().encode(&collection).unwrap();

        assert_eq!(encoded.coordinates.len(), 6);
        assert_eq!(encoded.features[0].id, "left");

        let right = encoded.features[1].geometry.as_ref().unwrap();
        assert_eq!(right.resolution(), Resolution::U8);
        assert_eq!(right.vertices.triangle_count(), 2);
        // The shared edge reuses indices 1 and 2 from the left square.
        let used: FxHashSet<u64> = right.global_indices().collect();
        assert_eq!(right.buffer_offset, 1);
        assert!(used.contains(&1) && used.contains(&2));
        assert_eq!(right.area, 1.0);
        assert_eq!(right.centroid, (1.5, 0.5));
    }

    #[test]
    fn test_decoded_indices_match_lookups() {
        let ring = vec![
            [0.0, 0.0],
            [4.0, 0.0],
            [4.0, 1.0],
            [1.0, 1.0],
            [1.0, 3.0],
            [0.0, 3.0],
            [0.0, 0.0],
        ];
        let collection = FeatureCollection::new(vec![polygon_feature(vec![ring.clone()])]);
        let encoded = GeometryEncoder::default().encode(&collection).unwrap();
        let geometry = encoded.features[0].geometry.as_ref().unwrap();

        let expected: FxHashSet<u64> = ring
            .iter()
            .map(|&[x, y]| encoded.coordinates.lookup(x as f32, y as f32).unwrap() as u64)
            .collect();
        let decoded: FxHashSet<u64> = geometry.global_indices().collect();
        assert_eq!(decoded, expected);
        assert!(geometry.vertices.iter().all(|local| local < 1 << 8));
    }

    #[test]
    fn test_unsupported_geometry_aborts() {
        let collection = FeatureCollection::new(vec![
            polygon_feature(vec![square(0.0, 0.0, 1.0)]),
            Feature::new(Some(Geometry::Unsupported {
                kind: "LineString".to_string(),
            }))
            .with_id("road"),
        ]);
        match GeometryEncoder::default().encode(&collection).unwrap_err() {
            Error::CoreError(trifeather_core::Error::UnsupportedGeometry { feature, .. }) => {
                assert_eq!(feature, "road")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_null_geometry_is_kept_as_none() {
        let collection = FeatureCollection::new(vec![
            Feature::new(None),
            polygon_feature(vec![square(0.0, 0.0, 1.0)]),
        ]);
        let encoded = GeometryEncoder::default().encode(&collection).unwrap();
        assert!(encoded.features[0].geometry.is_none());
        assert_eq!(encoded.features[0].id, "Feature_no_1");
        assert!(encoded.features[1].geometry.is_some());
        assert_eq!(encoded.coordinates.len(), 4);
    }

    #[test]
    fn test_collection_bounds_cover_every_coordinate() {
        let collection = FeatureCollection::new(vec![
            polygon_feature(vec![square(-2.0, 1.0, 1.0)]),
            Feature::new(None),
            polygon_feature(vec![square(3.0, -4.0, 2.0)]),
        ]);
        let encoded = GeometryEncoder::default().encode(&collection).unwrap();
        let bounds = encoded.bounds().unwrap();
        assert_eq!(bounds.to_array(), [-2.0, -4.0, 5.0, 2.0]);

        let empty = GeometryEncoder::default()
            .encode(&FeatureCollection::new(vec![Feature::new(None)]))
            .unwrap();
        assert_eq!(empty.bounds(), None);
    }

    #[test]
    fn test_degenerate_polygon_has_no_triangles() {
        let sliver = vec![[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]];
        let collection = FeatureCollection::new(vec![polygon_feature(vec![sliver])]);
        let encoded = GeometryEncoder::default().encode(&collection).unwrap();
        let geometry = encoded.features[0].geometry.as_ref().unwrap();
        assert!(geometry.vertices.is_empty());
        assert_eq!(geometry.buffer_offset, 0);
    }

    #[test]
    fn test_projection_is_applied() {
        let collection = FeatureCollection::new(vec![polygon_feature(vec![square(0.0, 0.0, 1.0)])]);
        let encoded = GeometryEncoder::new(Affine::new(10.0, (5.0, 0.0)).unwrap())
            .encode(&collection)
            .unwrap();
        assert_eq!(encoded.coordinates.lookup(15.0, 10.0), Some(2));
        let geometry = encoded.features[0].geometry.as_ref().unwrap();
        assert_eq!(geometry.area, 100.0);
    }

    #[test]
    fn test_large_feature_uses_wide_resolution() {
        // A 300-vertex convex-ish ring forces 16-bit indices.
        let n = 300;
        let mut ring: Vec<[f64; 2]> = (0..n)
            .map(|i| {
                let t = i as f64 / n as f64 * std::f64::consts::TAU;
                [t.cos() * 100.0, t.sin() * 100.0]
            })
            .collect();
        ring.push(ring[0]);
        let collection = FeatureCollection::new(vec![polygon_feature(vec![ring])]);
        let encoded = GeometryEncoder::default().encode(&collection).unwrap();
        let geometry = encoded.features[0].geometry.as_ref().unwrap();
        assert_eq!(encoded.coordinates.len(), n);
        assert_eq!(geometry.resolution(), Resolution::U16);
        assert_eq!(geometry.vertices.triangle_count(), n - 2);
    }
}
