// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The persisted geometry table.
//!
//! Row 0 is reserved for the shared coordinate buffer: its `vertices` cell
//! holds every coordinate as two little-endian `f32`s, `id` reads
//! `"coordinate buffer"` and the remaining cells are null. Rows `1..=n` are
//! the features in input order, followed by one column per property.

use crate::infer::{value_as_f64, value_as_i64, value_as_text, ColumnType, TypeInferrer};
use crate::{Error, Result};
use arrow::array::{
    Array, ArrayRef, AsArray, BinaryArray, BooleanArray, DictionaryArray, FixedSizeListArray,
    Float32Array, Float64Array, Int32Array, Int64Array, StringArray, UInt32Array, UInt8Array,
};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Field, Float32Type, Float64Type, Int32Type, Int64Type, Schema, UInt32Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use serde_json::{Number, Value};
use std::sync::Arc;
use trifeather_core::{CoordinateStore, Properties};
use trifeather_geometry::{
    Bounds, EncodedCollection, EncodedFeature, EncodedGeometry, Resolution, VertexBuffer,
};

/// `id` of the coordinate row
pub const COORDINATE_ROW_ID: &str = "coordinate buffer";

pub const VERTICES: &str = "vertices";
pub const BOUNDS: &str = "bounds";
pub const COORD_RESOLUTION: &str = "coord_resolution";
pub const COORD_BUFFER_OFFSET: &str = "coord_buffer_offset";
pub const PIXEL_AREA: &str = "pixel_area";
pub const CENTROID_X: &str = "centroid_x";
pub const CENTROID_Y: &str = "centroid_y";
pub const ID: &str = "id";

/// Column names owned by the table layout
pub const RESERVED_COLUMNS: [&str; 8] = [
    VERTICES,
    BOUNDS,
    COORD_RESOLUTION,
    COORD_BUFFER_OFFSET,
    PIXEL_AREA,
    CENTROID_X,
    CENTROID_Y,
    ID,
];

/// An encoded collection together with its property column types.
#[derive(Debug, Clone)]
pub struct GeometryTable {
    pub collection: EncodedCollection,
    pub columns: Vec<(String, ColumnType)>,
}

impl GeometryTable {
    /// Collect property columns in first-seen order and infer their types.
    ///
    /// Properties named like a layout column are dropped with a warning.
    pub fn new(collection: EncodedCollection, inferrer: &TypeInferrer) -> Result<Self> {
        let mut names: Vec<&str> = Vec::new();
        for feature in &collection.features {
            for key in feature.properties.keys() {
                if !names.contains(&key.as_str()) {
                    names.push(key);
                }
            }
        }

        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            if RESERVED_COLUMNS.contains(&name) {
                tracing::warn!(
                    column = name,
                    "property collides with a geometry table column, skipped"
                );
                continue;
            }
            let values = collection.features.iter().filter_map(|f| f.properties.get(name));
            let column_type = inferrer.infer(name, values)?;
            tracing::debug!(column = name, ?column_type, "inferred column type");
            columns.push((name.to_string(), column_type));
        }

        Ok(Self { collection, columns })
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let features = &self.collection.features;
        let coordinates = self.collection.coordinates.to_le_bytes();
        let geometries = || features.iter().map(|f| f.geometry.as_ref());

        let vertices: BinaryArray = std::iter::once(Some(coordinates.as_slice()))
            .chain(geometries().map(|g| g.map(|g| g.vertices.as_bytes())))
            .collect();
        let bounds = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            std::iter::once(None).chain(geometries().map(|g| {
                g.map(|g| g.bounds.to_array().map(|v| Some(v as f32)).to_vec())
            })),
            4,
        );
        let resolution: UInt8Array = std::iter::once(None)
            .chain(geometries().map(|g| g.map(|g| g.resolution().bits())))
            .collect();
        let offset: UInt32Array = std::iter::once(None)
            .chain(geometries().map(|g| g.map(|g| g.buffer_offset)))
            .collect();
        let area: Float64Array = std::iter::once(None)
            .chain(geometries().map(|g| g.map(|g| g.area)))
            .collect();
        let centroid_x: Float32Array = std::iter::once(None)
            .chain(geometries().map(|g| g.map(|g| g.centroid.0 as f32)))
            .collect();
        let centroid_y: Float32Array = std::iter::once(None)
            .chain(geometries().map(|g| g.map(|g| g.centroid.1 as f32)))
            .collect();
        let ids: StringArray = std::iter::once(Some(COORDINATE_ROW_ID))
            .chain(features.iter().map(|f| Some(f.id.as_str())))
            .collect();

        let mut fields = vec![
            Field::new(VERTICES, DataType::Binary, true),
            Field::new(BOUNDS, bounds.data_type().clone(), true),
            Field::new(COORD_RESOLUTION, DataType::UInt8, true),
            Field::new(COORD_BUFFER_OFFSET, DataType::UInt32, true),
            Field::new(PIXEL_AREA, DataType::Float64, true),
            Field::new(CENTROID_X, DataType::Float32, true),
            Field::new(CENTROID_Y, DataType::Float32, true),
            Field::new(ID, DataType::Utf8, false),
        ];
        let mut arrays: Vec<ArrayRef> = vec![
            Arc::new(vertices),
            Arc::new(bounds),
            Arc::new(resolution),
            Arc::new(offset),
            Arc::new(area),
            Arc::new(centroid_x),
            Arc::new(centroid_y),
            Arc::new(ids),
        ];

        let mut dict_id = 0i64;
        for (name, column_type) in &self.columns {
            let cells: Vec<Option<&Value>> = std::iter::once(None)
                .chain(features.iter().map(|f| f.properties.get(name).filter(|v| !v.is_null())))
                .collect();
            let array = property_array(name, *column_type, &cells);
            let field = if let DataType::Dictionary(_, _) = array.data_type() {
                dict_id += 1;
                Field::new_dict(name.clone(), array.data_type().clone(), true, dict_id, false)
            } else {
                Field::new(name.clone(), array.data_type().clone(), true)
            };
            fields.push(field);
            arrays.push(array);
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }

    /// Read a geometry table written by [`GeometryTable::to_record_batch`].
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        if batch.num_rows() == 0 {
            return Err(Error::InvalidTable("missing coordinate row".into()));
        }

        let vertices = column(batch, VERTICES)?
            .as_binary_opt::<i32>()
            .ok_or_else(|| wrong_type(VERTICES))?;
        let bounds = column(batch, BOUNDS)?
            .as_fixed_size_list_opt()
            .ok_or_else(|| wrong_type(BOUNDS))?;
        let resolution = column(batch, COORD_RESOLUTION)?
            .as_primitive_opt::<UInt8Type>()
            .ok_or_else(|| wrong_type(COORD_RESOLUTION))?;
        let offset = column(batch, COORD_BUFFER_OFFSET)?
            .as_primitive_opt::<UInt32Type>()
            .ok_or_else(|| wrong_type(COORD_BUFFER_OFFSET))?;
        let area = column(batch, PIXEL_AREA)?
            .as_primitive_opt::<Float64Type>()
            .ok_or_else(|| wrong_type(PIXEL_AREA))?;
        let centroid_x = column(batch, CENTROID_X)?
            .as_primitive_opt::<Float32Type>()
            .ok_or_else(|| wrong_type(CENTROID_X))?;
        let centroid_y = column(batch, CENTROID_Y)?
            .as_primitive_opt::<Float32Type>()
            .ok_or_else(|| wrong_type(CENTROID_Y))?;
        let ids = column(batch, ID)?
            .as_string_opt::<i32>()
            .ok_or_else(|| wrong_type(ID))?;

        if vertices.is_null(0) {
            return Err(Error::InvalidTable("coordinate row has no buffer".into()));
        }
        let coordinates = CoordinateStore::from_le_bytes(vertices.value(0))?;

        // Property columns, decoded once per column
        let schema = batch.schema();
        let mut columns = Vec::new();
        let mut property_values = Vec::new();
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            if RESERVED_COLUMNS.contains(&field.name().as_str()) {
                continue;
            }
            let (column_type, values) = property_values_of(field.name(), array)?;
            columns.push((field.name().clone(), column_type));
            property_values.push(values);
        }

        let mut features = Vec::with_capacity(batch.num_rows() - 1);
        for row in 1..batch.num_rows() {
            let geometry = if resolution.is_null(row) || vertices.is_null(row) {
                None
            } else {
                let res = Resolution::from_bits(resolution.value(row))?;
                let buffer = VertexBuffer::from_bytes(res, vertices.value(row).to_vec())?;
                let corners = bounds.value(row);
                let corners = corners
                    .as_primitive_opt::<Float32Type>()
                    .ok_or_else(|| wrong_type(BOUNDS))?;
                if corners.len() != 4 {
                    return Err(wrong_type(BOUNDS));
                }
                let corner = |i: usize| corners.value(i) as f64;
                Some(EncodedGeometry {
                    vertices: buffer,
                    buffer_offset: offset.value(row),
                    bounds: Bounds::from_array([corner(0), corner(1), corner(2), corner(3)]),
                    centroid: (centroid_x.value(row) as f64, centroid_y.value(row) as f64),
                    area: area.value(row),
                })
            };

            let mut properties = Properties::new();
            for ((name, _), values) in columns.iter().zip(&property_values) {
                if let Some(value) = &values[row] {
                    properties.insert(name.clone(), value.clone());
                }
            }

            features.push(EncodedFeature {
                id: ids.value(row).to_string(),
                properties,
                geometry,
            });
        }

        tracing::debug!(
            features = features.len(),
            coordinates = coordinates.len(),
            columns = columns.len(),
            "read geometry table"
        );
        Ok(Self {
            collection: EncodedCollection {
                coordinates,
                features,
            },
            columns,
        })
    }
}

fn column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::InvalidTable(format!("missing column '{}'", name)))
}

fn wrong_type(name: &str) -> Error {
    Error::InvalidTable(format!("column '{}' has an unexpected type", name))
}

// Build one property column. Values that cannot be read as the column type
// are written as null.
fn property_array(name: &str, column_type: ColumnType, cells: &[Option<&Value>]) -> ArrayRef {
    let unreadable = |readable: fn(&Value) -> bool| {
        cells.iter().flatten().filter(|v| !readable(v)).count()
    };

    let (array, dropped): (ArrayRef, usize) = match column_type {
        ColumnType::DictionaryText => {
            let texts: Vec<Option<String>> =
                cells.iter().map(|v| v.and_then(value_as_text)).collect();
            let values: DictionaryArray<Int32Type> = texts.iter().map(|v| v.as_deref()).collect();
            (Arc::new(values), 0)
        }
        ColumnType::Text => {
            let values: StringArray = cells.iter().map(|v| v.and_then(value_as_text)).collect();
            (Arc::new(values), 0)
        }
        ColumnType::Float32 => {
            let values: Float32Array = cells
                .iter()
                .map(|v| v.and_then(value_as_f64).map(|f| f as f32))
                .collect();
            (Arc::new(values), unreadable(|v| value_as_f64(v).is_some()))
        }
        ColumnType::Int32 | ColumnType::Int64 => {
            let values: Vec<Option<i64>> = cells.iter().map(|v| v.and_then(value_as_i64)).collect();
            let fits_i32 = values.iter().flatten().all(|&v| i32::try_from(v).is_ok());
            let array: ArrayRef = if column_type == ColumnType::Int32 && fits_i32 {
                let values: Int32Array = values.iter().map(|v| v.map(|v| v as i32)).collect();
                Arc::new(values)
            } else {
                if column_type == ColumnType::Int32 {
                    tracing::debug!(
                        column = name,
                        "values exceed 32 bits, column widened to Int64"
                    );
                }
                Arc::new(Int64Array::from(values))
            };
            (array, unreadable(|v| value_as_i64(v).is_some()))
        }
        ColumnType::Boolean => {
            let values: BooleanArray = cells.iter().map(|v| v.and_then(Value::as_bool)).collect();
            (Arc::new(values), unreadable(Value::is_boolean))
        }
    };

    if dropped > 0 {
        tracing::warn!(
            column = name,
            ?column_type,
            dropped,
            "values not readable as the column type were nulled"
        );
    }
    array
}

// Turn a stored property column back into JSON values, one per row.
fn property_values_of(
    name: &str,
    array: &ArrayRef,
) -> Result<(ColumnType, Vec<Option<Value>>)> {
    let bad = || {
        Error::InvalidTable(format!(
            "property column '{}' has unsupported type {}",
            name,
            array.data_type()
        ))
    };
    let cells = |f: &dyn Fn(usize) -> Value| -> Vec<Option<Value>> {
        (0..array.len())
            .map(|i| if array.is_null(i) { None } else { Some(f(i)) })
            .collect()
    };

    let result = match array.data_type() {
        DataType::Dictionary(_, value) if value.as_ref() == &DataType::Utf8 => {
            let text = cast(array, &DataType::Utf8)?;
            let text = text.as_string::<i32>();
            (ColumnType::DictionaryText, cells(&|i| Value::String(text.value(i).to_string())))
        }
        DataType::Utf8 => {
            let text = array.as_string::<i32>();
            (ColumnType::Text, cells(&|i| Value::String(text.value(i).to_string())))
        }
        DataType::Float32 => {
            let values = array.as_primitive::<Float32Type>();
            let to_value = |i: usize| {
                Number::from_f64(values.value(i) as f64).map_or(Value::Null, Value::Number)
            };
            (ColumnType::Float32, cells(&to_value))
        }
        DataType::Int32 => {
            let values = array.as_primitive::<Int32Type>();
            (ColumnType::Int32, cells(&|i| Value::from(values.value(i))))
        }
        DataType::Int64 => {
            let values = array.as_primitive::<Int64Type>();
            (ColumnType::Int64, cells(&|i| Value::from(values.value(i))))
        }
        DataType::Boolean => {
            let values = array.as_boolean();
            (ColumnType::Boolean, cells(&|i| Value::Bool(values.value(i))))
        }
        _ => return Err(bad()),
    };
    Ok(result)
}
