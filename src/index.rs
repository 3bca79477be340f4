//! Recovery of index columns recorded only in dataset metadata.
//!
//! Dataframe writers keep the row index out of the physical columns and
//! describe it under the `pandas` key of the schema metadata:
//!
//! ```json
//! {"index_columns": ["idx", {"kind": "range", "name": "row", "start": 0, "stop": 3, "step": 1}]}
//! ```
//!
//! A plain name absent from the physical columns is rebuilt positionally; a
//! named range descriptor is rebuilt as `start + step * row`.

use std::{collections::HashSet, sync::Arc};

use arrow::{
    array::{ArrayRef, Int64Array},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::{RecordBatch, RecordBatchOptions},
};
use serde::Deserialize;

use crate::observability::log_warn;

/// Schema metadata key holding the index declaration.
pub const INDEX_METADATA_KEY: &str = "pandas";

#[derive(Debug, Deserialize)]
struct IndexDeclaration {
    #[serde(default)]
    index_columns: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IndexEntry {
    Named(String),
    Descriptor(RangeDescriptor),
}

#[derive(Debug, Deserialize)]
struct RangeDescriptor {
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    start: i64,
    #[serde(default = "default_step")]
    step: i64,
}

fn default_step() -> i64 {
    1
}

/// An index column to append to the materialized table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    pub name: String,
    pub start: i64,
    pub step: i64,
}

impl IndexColumn {
    pub fn positional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: 0,
            step: 1,
        }
    }

    fn values(&self, rows: usize) -> Result<Int64Array, ArrowError> {
        let values = (0..rows as i64)
            .map(|row| {
                self.step
                    .checked_mul(row)
                    .and_then(|offset| self.start.checked_add(offset))
                    .ok_or_else(|| {
                        ArrowError::ComputeError(format!(
                            "index column '{}' overflows a 64-bit integer at row {row}",
                            self.name
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Int64Array::from(values))
    }
}

/// Index columns declared in metadata but missing from physical storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexMetadata {
    columns: Vec<IndexColumn>,
}

impl IndexMetadata {
    pub fn new(columns: Vec<IndexColumn>) -> Self {
        Self { columns }
    }

    /// Read the index declaration of `schema`. Declared names already
    /// present as physical columns are skipped, as are repeats and unnamed
    /// ranges. Malformed metadata is ignored.
    pub fn from_schema(schema: &Schema) -> Self {
        let Some(raw) = schema.metadata().get(INDEX_METADATA_KEY) else {
            return Self::default();
        };
        let declaration = match serde_json::from_str::<IndexDeclaration>(raw) {
            Ok(declaration) => declaration,
            Err(err) => {
                log_warn!(
                    component = "index",
                    event = "index_metadata_malformed",
                    error = %err,
                );
                return Self::default();
            }
        };

        let mut seen = schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect::<HashSet<_>>();
        let columns = declaration
            .index_columns
            .into_iter()
            .filter_map(|entry| match entry {
                IndexEntry::Named(name) => Some(IndexColumn::positional(name)),
                IndexEntry::Descriptor(range) if range.kind == "range" => {
                    range.name.map(|name| IndexColumn {
                        name,
                        start: range.start,
                        step: range.step,
                    })
                }
                IndexEntry::Descriptor(_) => None,
            })
            .filter(|column| seen.insert(column.name.clone()))
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[IndexColumn] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Append the index columns, in declaration order, after the physical
    /// columns of `table`. Fails if a range leaves the `i64` domain.
    pub fn apply(&self, table: RecordBatch) -> Result<RecordBatch, ArrowError> {
        if self.columns.is_empty() {
            return Ok(table);
        }
        let rows = table.num_rows();
        let schema = table.schema();

        let mut fields = schema.fields().iter().cloned().collect::<Vec<_>>();
        let mut arrays = table.columns().to_vec();
        for column in &self.columns {
            fields.push(Arc::new(Field::new(&column.name, DataType::Int64, false)));
            arrays.push(Arc::new(column.values(rows)?) as ArrayRef);
        }

        let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
        RecordBatch::try_new_with_options(
            schema,
            arrays,
            &RecordBatchOptions::new().with_row_count(Some(rows)),
        )
    }
}
