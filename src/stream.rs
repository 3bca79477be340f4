//! Record streams over a single Parquet dataset.

use std::{collections::VecDeque, iter::FusedIterator};

use arrow::{array::ArrayRef, record_batch::RecordBatch};

use crate::{
    dataset::DatasetHandle,
    error::{DatasetReadError, StreamError, UnmappableTypeError, ValueError},
    index::IndexMetadata,
    observability::{log_debug, log_info},
    schema::{PortableSchema, PortableType},
    value::{prepare_column, value_at, Record},
};

/// Rows per batch when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub(crate) batch_size: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl StreamOptions {
    /// Rows per internal batch. Output does not depend on it.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is zero. [`crate::TapConfig::validate`] reports
    /// the same condition as [`crate::TapError::InvalidBatchSize`].
    pub fn batch_size(self, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be greater than zero");
        StreamOptions { batch_size }
    }
}

/// A named stream of records read from one dataset location.
///
/// The portable schema is discovered once when the stream is opened and kept
/// until [`ParquetStream::reopen`]. Every [`ParquetStream::read_records`]
/// call rereads the dataset from storage.
#[derive(Debug)]
pub struct ParquetStream {
    name: String,
    handle: DatasetHandle,
    index: IndexMetadata,
    schema: PortableSchema,
    options: StreamOptions,
}

/// Physical columns in order, then the recoverable index columns.
fn discover_schema(
    handle: &DatasetHandle,
    index: &IndexMetadata,
) -> Result<PortableSchema, UnmappableTypeError> {
    let mut schema = PortableSchema::discover(&handle.physical_columns())?;
    for column in index.columns() {
        schema.push(&column.name, PortableType::Integer);
    }
    Ok(schema)
}

fn open_parts(
    path: &str,
) -> Result<(DatasetHandle, IndexMetadata, PortableSchema), StreamError> {
    let handle = DatasetHandle::open(path).map_err(|err| StreamError::new(path, err))?;
    let index = IndexMetadata::from_schema(handle.arrow_schema());
    let schema = discover_schema(&handle, &index).map_err(|err| StreamError::new(path, err))?;
    Ok((handle, index, schema))
}

impl ParquetStream {
    pub fn open(name: impl Into<String>, path: impl Into<String>) -> Result<Self, StreamError> {
        Self::with_options(name, path, StreamOptions::default())
    }

    /// Open the dataset and discover its schema. Fails without producing a
    /// stream when the path is unreadable or any column is unmappable.
    pub fn with_options(
        name: impl Into<String>,
        path: impl Into<String>,
        options: StreamOptions,
    ) -> Result<Self, StreamError> {
        let name = name.into();
        let path = path.into();
        let (handle, index, schema) = open_parts(&path)?;

        log_info!(
            component = "stream",
            event = "schema_discovered",
            stream = %name,
            path = %path,
            columns = schema.len(),
            index_columns = index.columns().len(),
        );

        Ok(Self {
            name,
            handle,
            index,
            schema,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        self.handle.location()
    }

    pub fn handle(&self) -> &DatasetHandle {
        &self.handle
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// The memoized schema.
    pub fn schema(&self) -> &PortableSchema {
        &self.schema
    }

    /// Resolve the path again and recompute the schema. On failure the
    /// stream keeps its previous state.
    pub fn reopen(&mut self) -> Result<(), StreamError> {
        let (handle, index, schema) = open_parts(self.handle.location())?;
        self.handle = handle;
        self.index = index;
        self.schema = schema;
        Ok(())
    }

    /// Materialize the dataset and iterate its rows in file order.
    ///
    /// Open and read failures are returned before any record. A value that
    /// cannot be converted ends the iteration with a single `Err` after the
    /// records preceding it have been yielded, so a retried read delivers
    /// those records again.
    pub fn read_records(&self) -> Result<RecordIter, StreamError> {
        let path = self.handle.location();
        let table = self
            .handle
            .read_table(self.options.batch_size)
            .map_err(|err| StreamError::new(path, err))?;
        let table = self
            .index
            .apply(table)
            .map_err(|err| StreamError::new(path, DatasetReadError::from(err)))?;

        let batches = split_batches(&table, self.options.batch_size);
        log_debug!(
            component = "stream",
            event = "records_materialized",
            stream = %self.name,
            rows = table.num_rows(),
            batches = batches.len(),
        );
        Ok(RecordIter::new(path, batches))
    }
}

fn split_batches(table: &RecordBatch, batch_size: usize) -> VecDeque<RecordBatch> {
    let rows = table.num_rows();
    (0..rows)
        .step_by(batch_size)
        .map(|offset| table.slice(offset, batch_size.min(rows - offset)))
        .collect()
}

struct CurrentBatch {
    names: Vec<String>,
    columns: Vec<ArrayRef>,
    rows: usize,
    next_row: usize,
}

impl CurrentBatch {
    /// Pair every column name with its value at `row`.
    fn record_at(&self, row: usize) -> Result<Record, (String, ValueError)> {
        let mut record = Record::with_capacity(self.columns.len());
        for (name, column) in self.names.iter().zip(&self.columns) {
            let value = value_at(column.as_ref(), row).map_err(|err| (name.clone(), err))?;
            record.push(name.as_str(), value);
        }
        Ok(record)
    }
}

/// Lazily transposes materialized batches into [`Record`]s.
///
/// Owns only in-memory batches, so dropping it early releases everything.
pub struct RecordIter {
    path: String,
    batches: VecDeque<RecordBatch>,
    current: Option<CurrentBatch>,
    /// Rows yielded from fully consumed batches.
    offset: usize,
    remaining: usize,
    failed: bool,
}

impl RecordIter {
    fn new(path: &str, batches: VecDeque<RecordBatch>) -> Self {
        let remaining = batches.iter().map(|b| b.num_rows()).sum();
        Self {
            path: path.to_string(),
            batches,
            current: None,
            offset: 0,
            remaining,
            failed: false,
        }
    }

    fn load(&self, batch: RecordBatch) -> Result<CurrentBatch, DatasetReadError> {
        let schema = batch.schema();
        let mut names = Vec::with_capacity(batch.num_columns());
        let mut columns = Vec::with_capacity(batch.num_columns());
        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            let column = prepare_column(column).map_err(|source| DatasetReadError::Value {
                column: field.name().clone(),
                row: self.offset,
                source,
            })?;
            names.push(field.name().clone());
            columns.push(column);
        }
        Ok(CurrentBatch {
            names,
            columns,
            rows: batch.num_rows(),
            next_row: 0,
        })
    }

    fn fail(&mut self, err: DatasetReadError) -> Option<Result<Record, StreamError>> {
        self.failed = true;
        self.current = None;
        self.batches.clear();
        self.remaining = 0;
        Some(Err(StreamError::new(&self.path, err)))
    }
}

impl Iterator for RecordIter {
    type Item = Result<Record, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            match self.current.as_mut() {
                Some(current) if current.next_row < current.rows => {
                    let row = current.next_row;
                    current.next_row += 1;
                    match current.record_at(row) {
                        Ok(record) => {
                            self.remaining -= 1;
                            return Some(Ok(record));
                        }
                        Err((column, source)) => {
                            let err = DatasetReadError::Value {
                                column,
                                row: self.offset + row,
                                source,
                            };
                            return self.fail(err);
                        }
                    }
                }
                Some(current) => {
                    self.offset += current.rows;
                    self.current = None;
                }
                None => {
                    let batch = self.batches.pop_front()?;
                    match self.load(batch) {
                        Ok(current) => self.current = Some(current),
                        Err(err) => return self.fail(err),
                    }
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl FusedIterator for RecordIter {}
