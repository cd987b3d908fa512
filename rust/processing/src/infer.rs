// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Column type inference for feature properties.
//!
//! Each property column is classified once, from a bounded sample of its
//! non-null values, and every value of the column is then written with that
//! type.

use crate::config::EncodeOptions;
use crate::Result;
use arrow::datatypes::DataType;
use rustc_hash::FxHashSet;
use serde_json::Value;

/// Persisted type of a property column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnType {
    DictionaryText,
    Text,
    Float32,
    Int32,
    Int64,
    Boolean,
}

impl ColumnType {
    pub fn data_type(self) -> DataType {
        match self {
            ColumnType::DictionaryText => {
                DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
            }
            ColumnType::Text => DataType::Utf8,
            ColumnType::Float32 => DataType::Float32,
            ColumnType::Int32 => DataType::Int32,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Boolean => DataType::Boolean,
        }
    }
}

/// Classifies property columns from a sample of their values.
#[derive(Debug, Clone, Copy)]
pub struct TypeInferrer {
    dictionary_threshold: f64,
    sample_size: usize,
}

impl Default for TypeInferrer {
    fn default() -> Self {
        Self::from_options(&EncodeOptions::default())
    }
}

impl TypeInferrer {
    pub fn new(dictionary_threshold: f64, sample_size: usize) -> Self {
        Self {
            dictionary_threshold,
            sample_size: sample_size.max(1),
        }
    }

    pub fn from_options(options: &EncodeOptions) -> Self {
        Self::new(options.dictionary_threshold, options.sample_size)
    }

    /// Infer the type of `column` from its values. Nulls are ignored.
    ///
    /// Fails on nested objects or arrays, which have no column mapping.
    pub fn infer<'a, I>(&self, column: &str, values: I) -> Result<ColumnType>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let present: Vec<&Value> = values.into_iter().filter(|v| !v.is_null()).collect();
        let stride = present.len().div_ceil(self.sample_size).max(1);

        let mut seen = FxHashSet::default();
        let mut strings = 0usize;
        let mut floats = 0usize;
        let mut numbers = 0usize;
        let mut booleans = 0usize;
        let mut max_int = 0u64;

        for value in present.iter().step_by(stride) {
            match value {
                Value::String(s) => {
                    strings += 1;
                    seen.insert(s.as_str());
                }
                Value::Number(n) => {
                    numbers += 1;
                    match integral_magnitude(n) {
                        Some(magnitude) => max_int = max_int.max(magnitude),
                        None => floats += 1,
                    }
                }
                Value::Bool(_) => booleans += 1,
                Value::Object(_) | Value::Array(_) => {
                    return Err(trifeather_core::Error::UnsupportedPropertyType {
                        column: column.to_string(),
                        value: value.to_string(),
                    }
                    .into());
                }
                Value::Null => {}
            }
        }

        let column_type = if strings > 0 {
            if (seen.len() as f64) < strings as f64 * self.dictionary_threshold {
                ColumnType::DictionaryText
            } else {
                ColumnType::Text
            }
        } else if floats > 0 {
            ColumnType::Float32
        } else if booleans > 0 && numbers == 0 {
            ColumnType::Boolean
        } else if max_int <= i32::MAX as u64 {
            ColumnType::Int32
        } else {
            ColumnType::Int64
        };
        Ok(column_type)
    }
}

// Magnitude of an integral number that fits i64, or `None` for anything that
// has to be stored as a float.
fn integral_magnitude(n: &serde_json::Number) -> Option<u64> {
    if let Some(i) = n.as_i64() {
        return Some(i.unsigned_abs());
    }
    if n.is_u64() {
        // Larger than i64::MAX
        return None;
    }
    let f = n.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f.abs() as u64)
    } else {
        None
    }
}

/// Text rendering used for text columns and passthrough values.
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Numeric reading of a value: numbers, numeric strings and booleans (as 0/1).
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Numeric reading of a count: numbers and numeric strings only.
pub fn value_as_count(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Integer reading of a value; non-integral numbers are rejected.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    if let Value::Number(n) = value {
        if let Some(i) = n.as_i64() {
            return Some(i);
        }
    }
    let f = value_as_f64(value)?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
