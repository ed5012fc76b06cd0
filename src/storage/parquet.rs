//! Parquet export of run results
//!
//! # Format
//!
//! - values: (`vertex` u32, `part` u32, `value` f64), one row per vertex
//! - placement: (`task` utf8, `part` u32, `processor` u32, `node` u32,
//!   `memories` utf8), one row per recorded point task; `memories` lists the
//!   memory of each region argument as `mem#a,mem#b,..`

use super::{PartitionBounds, VertexId};
use crate::pipeline::PlacementRecord;
use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Write final vertex values with their owning partition
///
/// # Errors
///
/// Returns error if file I/O fails or Arrow conversion fails
#[allow(clippy::cast_possible_truncation)]
pub fn write_values_parquet<V, P>(path: P, values: &[V], bounds: &PartitionBounds) -> Result<()>
where
    V: Copy + Into<f64>,
    P: AsRef<Path>,
{
    let vertices: Vec<VertexId> = (0..values.len() as VertexId).collect();
    let parts: Vec<u32> = vertices.iter().map(|&v| bounds.partition_of(v) as u32).collect();
    let values: Vec<f64> = values.iter().map(|&v| v.into()).collect();

    let schema = Arc::new(Schema::new(vec![
        Field::new("vertex", DataType::UInt32, false),
        Field::new("part", DataType::UInt32, false),
        Field::new("value", DataType::Float64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt32Array::from(vertices)),
        Arc::new(UInt32Array::from(parts)),
        Arc::new(Float64Array::from(values)),
    ];
    write_batch(path.as_ref(), schema, columns)
}

/// Read `(vertex, value)` pairs written by [`write_values_parquet`]
///
/// # Errors
///
/// Returns error if the file is missing or its columns have other types
pub fn read_values_parquet<P: AsRef<Path>>(path: P) -> Result<Vec<(VertexId, f64)>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch: RecordBatch = batch?;
        let vertices = batch
            .column(0)
            .as_any()
            .downcast_ref::<UInt32Array>()
            .context("Invalid vertex column type")?;
        let values = batch
            .column(2)
            .as_any()
            .downcast_ref::<Float64Array>()
            .context("Invalid value column type")?;
        rows.extend(vertices.values().iter().copied().zip(values.values().iter().copied()));
    }
    Ok(rows)
}

/// Write the placement report
///
/// # Errors
///
/// Returns error if file I/O fails or Arrow conversion fails
#[allow(clippy::cast_possible_truncation)]
pub fn write_placement_parquet<P: AsRef<Path>>(path: P, records: &[PlacementRecord]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("task", DataType::Utf8, false),
        Field::new("part", DataType::UInt32, false),
        Field::new("processor", DataType::UInt32, false),
        Field::new("node", DataType::UInt32, false),
        Field::new("memories", DataType::Utf8, false),
    ]));

    let tasks: Vec<String> = records.iter().map(|r| format!("{:?}", r.task)).collect();
    let memories: Vec<String> = records
        .iter()
        .map(|r| r.memories.iter().map(ToString::to_string).collect::<Vec<_>>().join(","))
        .collect();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(tasks)),
        Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.part as u32))),
        Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.processor.0))),
        Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.node))),
        Arc::new(StringArray::from(memories)),
    ];
    write_batch(path.as_ref(), schema, columns)
}

fn write_batch(path: &Path, schema: SchemaRef, columns: Vec<ArrayRef>) -> Result<()> {
    let batch = RecordBatch::try_new(schema.clone(), columns).context("Failed to create RecordBatch")?;
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::ZSTD(parquet::basic::ZstdLevel::try_new(3)?))
        .build();

    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    tracing::debug!(path = %path.display(), rows = batch.num_rows(), "parquet written");
    Ok(())
}
