//! Handle over a Parquet dataset backed by one or more files.

mod resolve;

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use arrow::{compute::concat_batches, datatypes::SchemaRef, record_batch::RecordBatch};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::{
    error::{DatasetOpenError, DatasetReadError},
    observability::log_debug,
    schema::PhysicalColumn,
};

/// Resolved dataset: the data files plus the Arrow schema of the first one.
///
/// Files are not held open. Every [`DatasetHandle::read_table`] opens them
/// again and drops them before returning.
#[derive(Debug, Clone)]
pub struct DatasetHandle {
    location: String,
    files: Vec<PathBuf>,
    schema: SchemaRef,
}

fn open_builder(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>, DatasetOpenError> {
    let file = File::open(path).map_err(|source| DatasetOpenError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ParquetRecordBatchReaderBuilder::try_new(file).map_err(|source| DatasetOpenError::Parquet {
        path: path.to_path_buf(),
        source,
    })
}

impl DatasetHandle {
    /// Resolve `location` and validate every file footer. All files must
    /// share the first file's columns.
    pub fn open(location: impl Into<String>) -> Result<Self, DatasetOpenError> {
        let location = location.into();
        let files = resolve::resolve_files(&location)?;

        let mut schema: Option<SchemaRef> = None;
        for path in &files {
            let builder = open_builder(path)?;
            match &schema {
                None => schema = Some(builder.schema().clone()),
                Some(expected) if expected.fields() != builder.schema().fields() => {
                    return Err(DatasetOpenError::SchemaMismatch { path: path.clone() });
                }
                Some(_) => {}
            }
        }
        let schema = schema.ok_or_else(|| DatasetOpenError::NoFiles(location.clone()))?;

        log_debug!(
            component = "dataset",
            event = "dataset_opened",
            location = %location,
            files = files.len(),
            columns = schema.fields().len(),
        );

        Ok(Self {
            location,
            files,
            schema,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Arrow schema including the dataset-level key/value metadata.
    pub fn arrow_schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Physical column descriptors in storage order. Reads no row data.
    pub fn physical_columns(&self) -> Vec<PhysicalColumn> {
        self.schema
            .fields()
            .iter()
            .map(|f| PhysicalColumn::from(f.as_ref()))
            .collect()
    }

    /// Load every file, in order, into one in-memory table.
    pub fn read_table(&self, batch_size: usize) -> Result<RecordBatch, DatasetReadError> {
        let mut batches = Vec::new();
        for path in &self.files {
            let file = File::open(path).map_err(|source| DatasetReadError::Io {
                path: path.clone(),
                source,
            })?;
            let builder = ParquetRecordBatchReaderBuilder::try_new(file)
                .map_err(|source| DatasetReadError::Parquet {
                    path: path.clone(),
                    source,
                })?;
            if builder.schema().fields() != self.schema.fields() {
                return Err(DatasetReadError::SchemaMismatch { path: path.clone() });
            }
            let reader = builder
                .with_batch_size(batch_size)
                .build()
                .map_err(|source| DatasetReadError::Parquet {
                    path: path.clone(),
                    source,
                })?;
            for batch in reader {
                batches.push(batch?);
            }
        }

        let table = concat_batches(&self.schema, &batches)?;
        log_debug!(
            component = "dataset",
            event = "table_materialized",
            location = %self.location,
            rows = table.num_rows(),
        );
        Ok(table)
    }
}
