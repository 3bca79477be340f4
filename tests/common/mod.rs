//! Common test utilities for integration tests.
#![allow(dead_code)]

use std::{collections::HashMap, fs::File, path::Path, sync::Arc};

use arrow::{
    array::ArrayRef,
    datatypes::{Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};

/// Build a batch from named columns, optionally tagging the schema with an
/// index declaration under the `pandas` metadata key.
pub fn batch_with_index(
    columns: Vec<(&str, ArrayRef)>,
    index_declaration: Option<&str>,
) -> RecordBatch {
    let fields = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect::<Vec<_>>();
    let metadata = index_declaration
        .map(|raw| HashMap::from([("pandas".to_string(), raw.to_string())]))
        .unwrap_or_default();
    let schema: SchemaRef = Arc::new(Schema::new_with_metadata(fields, metadata));
    RecordBatch::try_new(schema, columns.into_iter().map(|(_, a)| a).collect())
        .expect("record batch")
}

pub fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    batch_with_index(columns, None)
}

/// Write `batches` to a Parquet file, `rows_per_group` rows per row group.
pub fn write_parquet_grouped(path: &Path, batches: &[RecordBatch], rows_per_group: usize) {
    let schema = batches.first().expect("at least one batch").schema();
    let props = WriterProperties::builder()
        .set_max_row_group_size(rows_per_group)
        .build();
    let file = File::create(path).expect("create parquet file");
    let mut writer = ArrowWriter::try_new(file, schema, Some(props)).expect("arrow writer");
    for batch in batches {
        writer.write(batch).expect("write batch");
    }
    writer.close().expect("close writer");
}

pub fn write_parquet(path: &Path, batch: &RecordBatch) {
    write_parquet_grouped(path, std::slice::from_ref(batch), 1024 * 1024);
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}
