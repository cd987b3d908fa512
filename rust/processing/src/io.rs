// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Table persistence.
//!
//! Arrow IPC files are the feather-compatible container the geometry and
//! point tables are exchanged in. Parquet output uses ZSTD with dictionary
//! pages enabled.

use crate::{Error, Result};
use arrow::compute::concat_batches;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::io::Cursor;

/// Serialize a batch as an Arrow IPC file.
pub fn write_ipc(batch: &RecordBatch) -> Result<Bytes> {
    let mut buffer = Vec::new();
    {
        let mut writer = FileWriter::try_new(&mut buffer, &batch.schema())?;
        writer.write(batch)?;
        writer.finish()?;
    }
    tracing::debug!(rows = batch.num_rows(), bytes = buffer.len(), "wrote arrow ipc file");
    Ok(Bytes::from(buffer))
}

/// Read an Arrow IPC file back into a single batch.
pub fn read_ipc(data: &[u8]) -> Result<RecordBatch> {
    let reader = FileReader::try_new(Cursor::new(data), None)?;
    let schema = reader.schema();
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    if batches.is_empty() {
        return Err(Error::InvalidTable("arrow file holds no record batch".into()));
    }
    Ok(concat_batches(&schema, &batches)?)
}

/// Serialize a batch as a ZSTD-compressed Parquet file.
pub fn write_parquet(batch: &RecordBatch) -> Result<Bytes> {
    let mut buffer = Vec::new();
    let cursor = Cursor::new(&mut buffer);

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .set_dictionary_enabled(true)
        .build();

    let mut writer = ArrowWriter::try_new(cursor, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    tracing::debug!(rows = batch.num_rows(), bytes = buffer.len(), "wrote parquet file");
    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray, Float32Array, Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Float32Type, Schema};
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("x", DataType::Float32, false),
            Field::new("n", DataType::Int32, true),
            Field::new("name", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float32Array::from(vec![0.5, 1.5, 2.5])),
                Arc::new(Int32Array::from(vec![Some(1), None, Some(3)])),
                Arc::new(StringArray::from(vec![Some("a"), Some("b"), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_ipc_round_trip() {
        let original = batch();
        let bytes = write_ipc(&original).unwrap();
        // Arrow IPC files start with the ARROW1 magic.
        assert_eq!(&bytes[..6], b"ARROW1");
        let restored = read_ipc(&bytes).unwrap();
        assert_eq!(restored, original);
        assert_eq!(restored.column(0).as_primitive::<Float32Type>().value(2), 2.5);
        assert_eq!(restored.column(2).null_count(), 1);
    }

    #[test]
    fn test_read_ipc_rejects_garbage() {
        assert!(read_ipc(b"not an arrow file").is_err());
    }

    #[test]
    fn test_parquet_output() {
        let bytes = write_parquet(&batch()).unwrap();
        // Parquet files begin and end with PAR1.
        assert_eq!(&bytes[..4], b"PAR1");
        assert_eq!(&bytes[bytes.len() - 4..], b"PAR1");
    }
}
