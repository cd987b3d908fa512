// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for table building and dot-density generation.

use thiserror::Error;

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Processing errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Core error: {0}")]
    Core(#[from] trifeather_core::Error),

    #[error("Geometry error: {0}")]
    Geometry(#[from] trifeather_geometry::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid geometry table: {0}")]
    InvalidTable(String),

    #[error("Point arena expected {expected} points but {written} were written")]
    AllocationMismatch { expected: usize, written: usize },
}
