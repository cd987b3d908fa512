// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deduplicated coordinate table
//!
//! Every planar coordinate is stored once as a pair of `f32`s. Coordinates are
//! identified by the bit pattern of those 8 bytes, so two positions share an
//! index only if they round to exactly the same `f32` pair. Indices are handed
//! out in first-seen order and never change once the store is built.

use crate::{Error, Result};
use rustc_hash::FxHashMap;

/// Bit pattern of an `(x, y)` pair of `f32`s, x in the low 32 bits.
///
/// Reading the key as little-endian bytes gives the same 8 bytes a consumer
/// finds in the shared coordinate buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordKey(u64);

impl CoordKey {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        CoordKey(x.to_bits() as u64 | ((y.to_bits() as u64) << 32))
    }

    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        CoordKey(bits)
    }

    #[inline]
    pub fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn x(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    #[inline]
    pub fn y(self) -> f32 {
        f32::from_bits((self.0 >> 32) as u32)
    }
}

/// Accumulates coordinates during an encoding pass
#[derive(Debug, Default)]
pub struct CoordinateStoreBuilder {
    indices: FxHashMap<CoordKey, u32>,
    keys: Vec<CoordKey>,
}

impl CoordinateStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            indices: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            keys: Vec::with_capacity(capacity),
        }
    }

    /// Insert-or-lookup; returns the coordinate's index.
    pub fn insert(&mut self, x: f32, y: f32) -> Result<u32> {
        let key = CoordKey::new(x, y);
        if let Some(&index) = self.indices.get(&key) {
            return Ok(index);
        }
        let index = u32::try_from(self.keys.len()).map_err(|_| Error::CoordinateOverflow)?;
        self.indices.insert(key, index);
        self.keys.push(key);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn build(self) -> CoordinateStore {
        CoordinateStore {
            indices: self.indices,
            keys: self.keys,
        }
    }
}

/// Immutable coordinate table shared by every feature of one encoding pass
#[derive(Debug, Clone, Default)]
pub struct CoordinateStore {
    indices: FxHashMap<CoordKey, u32>,
    keys: Vec<CoordKey>,
}

impl CoordinateStore {
    pub fn builder() -> CoordinateStoreBuilder {
        CoordinateStoreBuilder::new()
    }

    /// Index of an exact `f32` pair
    #[inline]
    pub fn lookup(&self, x: f32, y: f32) -> Option<u32> {
        self.indices.get(&CoordKey::new(x, y)).copied()
    }

    /// Coordinate at `index`
    #[inline]
    pub fn coordinate(&self, index: u32) -> Option<(f32, f32)> {
        self.keys
            .get(index as usize)
            .map(|key| (key.x(), key.y()))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[CoordKey] {
        &self.keys
    }

    /// Shared coordinate buffer: coordinate `i` is two little-endian `f32`s at byte `i * 8`.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.keys.len() * 8);
        for key in &self.keys {
            bytes.extend_from_slice(&key.bits().to_le_bytes());
        }
        bytes
    }

    /// Rebuild a store from a shared coordinate buffer.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 8 != 0 {
            return Err(Error::InvalidCoordinateBuffer(bytes.len()));
        }
        let mut builder = CoordinateStoreBuilder::with_capacity(bytes.len() / 8);
        for chunk in bytes.chunks_exact(8) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            let key = CoordKey::from_bits(u64::from_le_bytes(raw));
            let expected = builder.len();
            let index = builder.insert(key.x(), key.y())?;
            if index as usize != expected {
                return Err(Error::DuplicateCoordinate {
                    index: expected,
                    first: index,
                });
            }
        }
        Ok(builder.build())
    }
}
