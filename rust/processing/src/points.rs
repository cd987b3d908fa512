// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pre-sized point storage written in shuffled order.
//!
//! The total number of points is known before the first one is generated.
//! Every point goes to the slot named by a fixed random permutation, so the
//! row order of the finished table carries no trace of the order in which
//! features and categories were processed.

use crate::categories::CategoryColumn;
use crate::{Error, Result};
use arrow::array::{ArrayRef, Float32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// A uniform random ordering of `[0, total)`
#[derive(Debug, Clone)]
pub struct OutputPermutation {
    slots: Vec<u32>,
}

impl OutputPermutation {
    pub fn shuffled<R: Rng + ?Sized>(total: usize, rng: &mut R) -> Result<Self> {
        let total = u32::try_from(total).map_err(|_| {
            Error::InvalidConfig(format!("{} points exceed the 32-bit row limit", total))
        })?;
        let mut slots: Vec<u32> = (0..total).collect();
        slots.shuffle(rng);
        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn slot(&self, cursor: usize) -> Option<usize> {
        self.slots.get(cursor).map(|&s| s as usize)
    }
}

/// Output arrays sized for exactly `total` points.
///
/// Each slot is written once: the cursor only moves forward and the
/// permutation never repeats a slot.
#[derive(Debug)]
pub struct PointArena {
    permutation: OutputPermutation,
    cursor: usize,
    x: Vec<f32>,
    y: Vec<f32>,
    labels: Vec<u16>,
    keep_names: Vec<String>,
    keep: Vec<Vec<Option<String>>>,
}

impl PointArena {
    pub fn new<R: Rng + ?Sized>(
        total: usize,
        keep_names: Vec<String>,
        rng: &mut R,
    ) -> Result<Self> {
        let permutation = OutputPermutation::shuffled(total, rng)?;
        let keep = keep_names.iter().map(|_| vec![None; total]).collect();
        Ok(Self {
            permutation,
            cursor: 0,
            x: vec![0.0; total],
            y: vec![0.0; total],
            labels: vec![0; total],
            keep_names,
            keep,
        })
    }

    pub fn capacity(&self) -> usize {
        self.permutation.len()
    }

    /// Write one point. `keep` holds a value per keep column, in order.
    pub fn push(&mut self, x: f32, y: f32, label: u16, keep: &[Option<String>]) -> Result<()> {
        let slot = self.permutation.slot(self.cursor).ok_or(Error::AllocationMismatch {
            expected: self.capacity(),
            written: self.cursor + 1,
        })?;
        self.x[slot] = x;
        self.y[slot] = y;
        self.labels[slot] = label;
        for (column, value) in self.keep.iter_mut().zip(keep) {
            column[slot] = value.clone();
        }
        self.cursor += 1;
        Ok(())
    }

    /// Close the arena. Every slot must have been written.
    pub fn finish(self) -> Result<PointTable> {
        if self.cursor != self.capacity() {
            return Err(Error::AllocationMismatch {
                expected: self.capacity(),
                written: self.cursor,
            });
        }
        Ok(PointTable {
            x: self.x,
            y: self.y,
            labels: self.labels,
            keep: self.keep_names.into_iter().zip(self.keep).collect(),
        })
    }
}

/// Finished points in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct PointTable {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    /// Category label number of each point
    pub labels: Vec<u16>,
    pub keep: Vec<(String, Vec<Option<String>>)>,
}

impl PointTable {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Columns: `x`, `y`, one dictionary column per category column, then
    /// the keep columns as nullable text.
    pub fn to_record_batch(&self, categories: &[CategoryColumn]) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(2 + categories.len() + self.keep.len());
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());

        fields.push(Field::new("x", DataType::Float32, false));
        columns.push(Arc::new(Float32Array::from(self.x.clone())));
        fields.push(Field::new("y", DataType::Float32, false));
        columns.push(Arc::new(Float32Array::from(self.y.clone())));

        for (dict_id, category) in categories.iter().enumerate() {
            let array = category.to_array(&self.labels)?;
            fields.push(Field::new_dict(
                category.name.clone(),
                array.data_type().clone(),
                false,
                dict_id as i64,
                false,
            ));
            columns.push(array);
        }

        for (name, values) in &self.keep {
            fields.push(Field::new(name.clone(), DataType::Utf8, true));
            columns.push(Arc::new(StringArray::from(values.clone())));
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::CategoryEncoder;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Float32Type, Int8Type};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_permutation_covers_every_slot() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let permutation = OutputPermutation::shuffled(500, &mut rng).unwrap();
        let mut seen = vec![false; 500];
        for cursor in 0..500 {
            let slot = permutation.slot(cursor).unwrap();
            assert!(!seen[slot]);
            seen[slot] = true;
        }
        assert!(permutation.slot(500).is_none());
    }

    #[test]
    fn test_arena_requires_exact_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut arena = PointArena::new(2, vec![], &mut rng).unwrap();
        arena.push(1.0, 1.0, 0, &[]).unwrap();
        assert!(matches!(
            arena.finish(),
            Err(Error::AllocationMismatch { expected: 2, written: 1 })
        ));

        let mut arena = PointArena::new(1, vec![], &mut rng).unwrap();
        arena.push(1.0, 1.0, 0, &[]).unwrap();
        assert!(arena.push(2.0, 2.0, 0, &[]).is_err());
    }

    #[test]
    fn test_empty_arena() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let table = PointArena::new(0, vec!["id".into()], &mut rng)
            .unwrap()
            .finish()
            .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_points_land_in_permuted_slots() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut arena = PointArena::new(50, vec!["id".into()], &mut rng).unwrap();
        for i in 0..50 {
            arena
                .push(i as f32, -(i as f32), (i % 2) as u16, &[Some(format!("f{}", i))])
                .unwrap();
        }
        let table = arena.finish().unwrap();
        // Each point keeps its fields together; the row order is shuffled.
        for row in 0..50 {
            let i = table.x[row] as usize;
            assert_eq!(table.y[row], -(i as f32));
            assert_eq!(table.labels[row], (i % 2) as u16);
            assert_eq!(table.keep[0].1[row], Some(format!("f{}", i)));
        }
        let in_order = (0..50).all(|row| table.x[row] == row as f32);
        assert!(!in_order);
    }

    #[test]
    fn test_record_batch_layout() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut arena = PointArena::new(3, vec!["county".into()], &mut rng).unwrap();
        arena.push(0.0, 0.0, 0, &[Some("a".into())]).unwrap();
        arena.push(1.0, 1.0, 1, &[None]).unwrap();
        arena.push(2.0, 2.0, 1, &[Some("c".into())]).unwrap();
        let table = arena.finish().unwrap();

        let labels = vec!["white_hispanic".to_string(), "black_non-hispanic".to_string()];
        let categories = CategoryEncoder::new(vec!["race".into(), "ethnicity".into()], "_")
            .encode(&labels)
            .unwrap();
        let batch = table.to_record_batch(&categories).unwrap();

        assert_eq!(batch.num_rows(), 3);
        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["x", "y", "race", "ethnicity", "county"]);
        assert_eq!(
            batch.column(2).data_type(),
            &DataType::Dictionary(Box::new(DataType::Int8), Box::new(DataType::Utf8))
        );

        let x = batch.column(0).as_primitive::<Float32Type>();
        let race = batch.column(2).as_dictionary::<Int8Type>();
        let race_values = race.values().as_string::<i32>();
        for row in 0..3 {
            let expected = if x.value(row) == 0.0 { "white" } else { "black" };
            assert_eq!(race_values.value(race.keys().value(row) as usize), expected);
        }
        assert_eq!(batch.column(4).null_count(), 1);
    }
}
