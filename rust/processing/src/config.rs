// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Options for the encoding and dot-density passes.

use crate::{Error, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

/// Options for building the geometry table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Text columns whose distinct/total ratio falls below this are dictionary-encoded.
    pub dictionary_threshold: f64,
    /// Number of non-null values sampled per column for type inference.
    pub sample_size: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            dictionary_threshold: 0.75,
            sample_size: 200,
        }
    }
}

impl EncodeOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.dictionary_threshold) {
            return Err(Error::InvalidConfig(format!(
                "dictionary_threshold must be within [0, 1], got {}",
                self.dictionary_threshold
            )));
        }
        if self.sample_size == 0 {
            return Err(Error::InvalidConfig("sample_size must be positive".into()));
        }
        Ok(())
    }
}

/// Options for generating a dot-density point table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DotDensityOptions {
    /// Numeric count properties; each one is a category label.
    pub fields: Vec<String>,
    /// How many counted units one point stands for.
    pub points_represent: f64,
    /// Properties copied, as text, onto every point of a feature.
    pub keep: Vec<String>,
    /// Category column names. More than one splits every label on `delimiter`.
    pub names: Vec<String>,
    pub delimiter: String,
    /// Fixed seed for reproducible output; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for DotDensityOptions {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            points_represent: 1.0,
            keep: Vec::new(),
            names: vec!["category".to_string()],
            delimiter: "_".to_string(),
            seed: None,
        }
    }
}

impl DotDensityOptions {
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_points_represent(mut self, points_represent: f64) -> Self {
        self.points_represent = points_represent;
        self
    }

    pub fn with_keep(mut self, keep: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keep = keep.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_split(
        mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
        delimiter: impl Into<String>,
    ) -> Self {
        self.names = names.into_iter().map(Into::into).collect();
        self.delimiter = delimiter.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(Error::InvalidConfig("at least one count field is required".into()));
        }
        if !self.points_represent.is_finite() || self.points_represent <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "points_represent must be finite and positive, got {}",
                self.points_represent
            )));
        }
        if self.names.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one category column name is required".into(),
            ));
        }
        if self.names.len() > 1 && self.delimiter.is_empty() {
            return Err(Error::InvalidConfig(
                "a delimiter is required to split categories into several columns".into(),
            ));
        }
        Ok(())
    }

    /// Generator for one pass: seeded when `seed` is set.
    pub fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}
