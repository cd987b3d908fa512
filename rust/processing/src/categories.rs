// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dictionary encoding of category labels.
//!
//! Labels can be compound ("white_non-hispanic"). With several column names
//! each label is split on the delimiter and every part gets its own
//! dictionary column; with a single name the whole label is the value.

use crate::{Error, Result};
use arrow::array::{ArrayRef, DictionaryArray, Int16Array, Int8Array, StringArray};
use arrow::datatypes::{Int16Type, Int8Type};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Dictionaries of up to this many entries use 8-bit keys.
pub const MAX_INT8_DICTIONARY: usize = 127;

/// Largest dictionary a 16-bit key can address.
pub const MAX_INT16_DICTIONARY: usize = i16::MAX as usize + 1;

/// Integer width of dictionary keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWidth {
    Int8,
    Int16,
}

/// One dictionary-encoded category column.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryColumn {
    pub name: String,
    /// Distinct values in first-seen order
    pub dictionary: Vec<String>,
    /// Dictionary code of every label, indexed by label number
    pub codes: Vec<u16>,
}

impl CategoryColumn {
    pub fn key_width(&self) -> KeyWidth {
        if self.dictionary.len() <= MAX_INT8_DICTIONARY {
            KeyWidth::Int8
        } else {
            KeyWidth::Int16
        }
    }

    /// Code for a label number
    #[inline]
    pub fn code(&self, label: u16) -> Option<u16> {
        self.codes.get(label as usize).copied()
    }

    /// Build the dictionary array for points given by label number.
    pub fn to_array(&self, labels: &[u16]) -> Result<ArrayRef> {
        let missing = |label: u16| {
            Error::InvalidConfig(format!(
                "label number {} is outside column '{}'",
                label, self.name
            ))
        };
        let values = Arc::new(StringArray::from(self.dictionary.clone()));
        let array: ArrayRef = match self.key_width() {
            KeyWidth::Int8 => {
                let keys = labels
                    .iter()
                    .map(|&l| self.code(l).map(|c| c as i8).ok_or_else(|| missing(l)))
                    .collect::<Result<Vec<i8>>>()?;
                Arc::new(DictionaryArray::<Int8Type>::try_new(Int8Array::from(keys), values)?)
            }
            KeyWidth::Int16 => {
                let keys = labels
                    .iter()
                    .map(|&l| self.code(l).map(|c| c as i16).ok_or_else(|| missing(l)))
                    .collect::<Result<Vec<i16>>>()?;
                Arc::new(DictionaryArray::<Int16Type>::try_new(Int16Array::from(keys), values)?)
            }
        };
        Ok(array)
    }
}

/// Splits and dictionary-encodes category labels.
#[derive(Debug, Clone)]
pub struct CategoryEncoder {
    names: Vec<String>,
    delimiter: String,
}

impl CategoryEncoder {
    pub fn new(names: Vec<String>, delimiter: impl Into<String>) -> Self {
        Self {
            names,
            delimiter: delimiter.into(),
        }
    }

    /// Encode `labels` into one column per name.
    pub fn encode(&self, labels: &[String]) -> Result<Vec<CategoryColumn>> {
        if labels.len() > u16::MAX as usize + 1 {
            return Err(Error::InvalidConfig(format!(
                "{} category labels exceed the 16-bit limit",
                labels.len()
            )));
        }
        let split = self.names.len() > 1;

        let mut columns = Vec::with_capacity(self.names.len());
        for (position, name) in self.names.iter().enumerate() {
            let mut lookup: FxHashMap<&str, u16> = FxHashMap::default();
            let mut dictionary = Vec::new();
            let mut codes = Vec::with_capacity(labels.len());

            for label in labels {
                let part = if split {
                    label.split(self.delimiter.as_str()).nth(position).ok_or_else(|| {
                        Error::InvalidConfig(format!(
                            "label '{}' has no part {} for column '{}' when split on '{}'",
                            label, position, name, self.delimiter
                        ))
                    })?
                } else {
                    label.as_str()
                };
                let code = match lookup.get(part) {
                    Some(&code) => code,
                    None => {
                        let code = dictionary.len() as u16;
                        lookup.insert(part, code);
                        dictionary.push(part.to_string());
                        code
                    }
                };
                codes.push(code);
            }

            if dictionary.len() > MAX_INT16_DICTIONARY {
                return Err(Error::InvalidConfig(format!(
                    "column '{}' has {} distinct values, more than a 16-bit dictionary holds",
                    name,
                    dictionary.len()
                )));
            }
            columns.push(CategoryColumn {
                name: name.clone(),
                dictionary,
                codes,
            });
        }
        Ok(columns)
    }
}
