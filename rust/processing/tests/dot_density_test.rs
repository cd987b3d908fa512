// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end runs: GeoJSON to geometry table, through an Arrow file, to
//! dot-density points.

use arrow::array::{Array, AsArray};
use arrow::datatypes::{Float32Type, Int8Type};
use rustc_hash::FxHashMap;
use trifeather_core::FeatureCollection;
use trifeather_geometry::decode_triangles;
use trifeather_processing::{
    dot_density, encode_features, io, DotDensityOptions, EncodeOptions, Error, GeometryTable,
};

// Four tracts: two squares sharing an edge, one square with a hole and a
// multipolygon. A fifth feature has no geometry.
const TRACTS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "id": "west",
     "properties": {"county": "Kings", "white_hispanic": 120, "black_non-hispanic": 35.5},
     "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}},
    {"type": "Feature", "id": "east",
     "properties": {"county": "Kings", "white_hispanic": "48", "black_non-hispanic": 0},
     "geometry": {"type": "Polygon", "coordinates": [[[10,0],[20,0],[20,10],[10,10],[10,0]]]}},
    {"type": "Feature", "id": "ring",
     "properties": {"county": "Queens", "white_hispanic": 64, "black_non-hispanic": 64},
     "geometry": {"type": "Polygon", "coordinates": [
        [[30,0],[40,0],[40,10],[30,10],[30,0]],
        [[32,2],[38,2],[38,8],[32,8],[32,2]]]}},
    {"type": "Feature", "id": "islands",
     "properties": {"county": "Queens", "white_hispanic": 10, "black_non-hispanic": null},
     "geometry": {"type": "MultiPolygon", "coordinates": [
        [[[50,0],[52,0],[52,2],[50,2],[50,0]]],
        [[[60,0],[64,0],[64,4],[60,4],[60,0]]]]}},
    {"type": "Feature", "id": "water",
     "properties": {"county": "Kings", "white_hispanic": 500},
     "geometry": null}
  ]
}"#;

fn tracts() -> GeometryTable {
    let collection = FeatureCollection::from_json(TRACTS).unwrap();
    encode_features(&collection, &EncodeOptions::default()).unwrap()
}

fn options() -> DotDensityOptions {
    DotDensityOptions::new(["white_hispanic", "black_non-hispanic"])
        .with_keep(["id", "county"])
        .with_split(["race", "ethnicity"], "_")
        .with_seed(2024)
}

#[test]
fn test_shared_edges_share_coordinates() {
    let table = tracts();
    // 4 + 2 new corners for the squares, 8 for the holed square, 8 for the islands
    assert_eq!(table.collection.coordinates.len(), 22);

    let east = table.collection.features[1].geometry.as_ref().unwrap();
    let indices: Vec<u64> = east.global_indices().collect();
    assert!(indices.contains(&1) && indices.contains(&2));
    assert_eq!(east.buffer_offset, 1);

    let ring = table.collection.features[2].geometry.as_ref().unwrap();
    assert!((ring.area - 64.0).abs() < 1e-9);
    assert!(table.collection.features[4].geometry.is_none());
}

#[test]
fn test_geometry_table_survives_arrow_file() {
    let table = tracts();
    let bytes = io::write_ipc(&table.to_record_batch().unwrap()).unwrap();
    let restored = GeometryTable::from_record_batch(&io::read_ipc(&bytes).unwrap()).unwrap();

    assert_eq!(restored.len(), 5);
    assert_eq!(restored.collection.coordinates.keys(), table.collection.coordinates.keys());
    for (before, after) in table.collection.features.iter().zip(&restored.collection.features) {
        assert_eq!(before.id, after.id);
        let (Some(b), Some(a)) = (&before.geometry, &after.geometry) else {
            assert!(before.geometry.is_none() && after.geometry.is_none());
            continue;
        };
        let b_triangles = decode_triangles(b, &table.collection.coordinates).unwrap();
        let a_triangles = decode_triangles(a, &restored.collection.coordinates).unwrap();
        assert_eq!(b_triangles, a_triangles);
    }
    // One text value turns the whole count column into text.
    assert_eq!(
        restored.collection.features[1].properties["white_hispanic"],
        serde_json::json!("48")
    );
    assert_eq!(
        restored.collection.features[0].properties["white_hispanic"],
        serde_json::json!("120")
    );
}

#[test]
fn test_points_match_targets_per_feature() {
    let table = tracts();
    let result = dot_density(&table.collection, &options()).unwrap();

    assert_eq!(result.targets[0][0], 120);
    assert!(matches!(result.targets[0][1], 35 | 36));
    assert_eq!(result.targets[1], vec![48, 0]);
    assert_eq!(result.targets[2], vec![64, 64]);
    assert_eq!(result.targets[3], vec![10, 0]);
    // No geometry, no points
    assert_eq!(result.targets[4], vec![0, 0]);

    let batch = result.to_record_batch().unwrap();
    assert_eq!(batch.num_rows() as u64, result.total());

    let x = batch.column_by_name("x").unwrap().as_primitive::<Float32Type>();
    let y = batch.column_by_name("y").unwrap().as_primitive::<Float32Type>();
    let ids = batch.column_by_name("id").unwrap().as_string::<i32>();
    let race = batch.column_by_name("race").unwrap().as_dictionary::<Int8Type>();
    let race_values = race.values().as_string::<i32>();

    let mut counts: FxHashMap<(String, String), u64> = FxHashMap::default();
    for row in 0..batch.num_rows() {
        let id = ids.value(row).to_string();
        let label = race_values.value(race.keys().value(row) as usize).to_string();
        let (px, py) = (x.value(row), y.value(row));
        match id.as_str() {
            "west" => assert!((0.0..=10.0).contains(&px)),
            "east" => assert!((10.0..=20.0).contains(&px)),
            "ring" => assert!((30.0..=40.0).contains(&px) && (0.0..=10.0).contains(&py)),
            "islands" => assert!((50.0..=52.0).contains(&px) || (60.0..=64.0).contains(&px)),
            other => panic!("point from unexpected feature {}", other),
        }
        *counts.entry((id, label)).or_default() += 1;
    }

    let features = ["west", "east", "ring", "islands"];
    let labels = ["white", "black"];
    for (f, name) in features.iter().enumerate() {
        for (k, label) in labels.iter().enumerate() {
            let placed = counts
                .get(&(name.to_string(), label.to_string()))
                .copied()
                .unwrap_or(0);
            assert_eq!(placed, result.targets[f][k], "{} {}", name, label);
        }
    }
}

#[test]
fn test_hole_stays_empty() {
    let table = tracts();
    let options = DotDensityOptions::new(["white_hispanic", "black_non-hispanic"])
        .with_keep(["id"])
        .with_seed(99);
    let result = dot_density(&table.collection, &options).unwrap();
    let (_, ids) = &result.points.keep[0];
    for row in 0..result.points.len() {
        if ids[row].as_deref() == Some("ring") {
            let (px, py) = (result.points.x[row], result.points.y[row]);
            let inside_hole = px > 32.0 && px < 38.0 && py > 2.0 && py < 8.0;
            assert!(!inside_hole, "point ({}, {}) inside the hole", px, py);
        }
    }
}

#[test]
fn test_same_seed_same_points() {
    let table = tracts();
    let first = dot_density(&table.collection, &options()).unwrap();
    let second = dot_density(&table.collection, &options()).unwrap();
    assert_eq!(first.points, second.points);

    let other = dot_density(&table.collection, &options().with_seed(7)).unwrap();
    assert_eq!(other.targets[2], first.targets[2]);
    assert_ne!(other.points.x, first.points.x);
}

#[test]
fn test_points_represent_scales_targets() {
    let table = tracts();
    let result = dot_density(&table.collection, &options().with_points_represent(8.0)).unwrap();
    assert_eq!(result.targets[0][0], 15);
    assert_eq!(result.targets[1][0], 6);
    assert_eq!(result.targets[2], vec![8, 8]);
    assert_eq!(result.points.len() as u64, result.total());
}

#[test]
fn test_point_table_parquet() {
    let table = tracts();
    let result = dot_density(&table.collection, &options()).unwrap();
    let batch = result.to_record_batch().unwrap();
    let bytes = io::write_parquet(&batch).unwrap();
    assert!(bytes.len() > 8);
    assert_eq!(&bytes[..4], b"PAR1");

    let feather = io::write_ipc(&batch).unwrap();
    let restored = io::read_ipc(&feather).unwrap();
    assert_eq!(restored.num_rows(), batch.num_rows());
    assert_eq!(restored.column_by_name("ethnicity").unwrap().null_count(), 0);
}

#[test]
fn test_bad_split_is_rejected() {
    let table = tracts();
    let options =
        DotDensityOptions::new(["white_hispanic", "black"]).with_split(["race", "ethnicity"], "_");
    assert!(matches!(
        dot_density(&table.collection, &options),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn test_unsupported_geometry_aborts_encoding() {
    let text = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {},
         "geometry": {"type": "LineString", "coordinates": [[0,0],[1,1]]}}
    ]}"#;
    let collection = FeatureCollection::from_json(text).unwrap();
    let err = encode_features(&collection, &EncodeOptions::default()).unwrap_err();
    assert!(err.to_string().contains("LineString"));
}
