//! Error taxonomy for opening, describing and reading Parquet datasets.

use std::{
    fmt::{Display, Formatter},
    io,
    path::PathBuf,
};

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

/// The dataset path could not be resolved to readable Parquet files.
#[derive(Debug, Error)]
pub enum DatasetOpenError {
    #[error("dataset io error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("'{path}' is not a readable parquet file: {source}")]
    Parquet {
        path: PathBuf,
        #[source]
        source: ParquetError,
    },
    #[error("no data files found for '{0}'")]
    NoFiles(String),
    #[error("schema of '{path}' does not match the dataset schema")]
    SchemaMismatch { path: PathBuf },
    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A physical type tag with no portable counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "unmappable data type '{tag}'{}",
    .column.as_ref().map(|c| format!(" in column '{c}'")).unwrap_or_default()
)]
pub struct UnmappableTypeError {
    pub tag: String,
    pub column: Option<String>,
}

impl UnmappableTypeError {
    pub(crate) fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            column: None,
        }
    }

    pub(crate) fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

/// A single cell could not be turned into a [`crate::Value`].
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("timestamp or date value out of range for {data_type}")]
    OutOfRange { data_type: String },
    #[error("unsupported column type {0}")]
    Unsupported(String),
    #[error("value arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

/// Materialization failed after the dataset was opened.
#[derive(Debug, Error)]
pub enum DatasetReadError {
    #[error("read io error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("read parquet error at '{path}': {source}")]
    Parquet {
        path: PathBuf,
        #[source]
        source: ParquetError,
    },
    #[error("read arrow error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("schema of '{path}' changed since the dataset was opened")]
    SchemaMismatch { path: PathBuf },
    #[error("column '{column}' row {row}: {source}")]
    Value {
        column: String,
        row: usize,
        #[source]
        source: ValueError,
    },
}

/// The stage of a stream's lifecycle an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Open,
    SchemaDiscovery,
    Read,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Open => write!(f, "open"),
            Phase::SchemaDiscovery => write!(f, "schema discovery"),
            Phase::Read => write!(f, "read"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StreamErrorKind {
    #[error(transparent)]
    Open(#[from] DatasetOpenError),
    #[error(transparent)]
    Unmappable(#[from] UnmappableTypeError),
    #[error(transparent)]
    Read(#[from] DatasetReadError),
}

/// Error surfaced by a [`crate::ParquetStream`]: the failing path, the phase
/// and the wrapped cause.
#[derive(Debug, Error)]
#[error("{phase} failed for '{path}': {kind}")]
pub struct StreamError {
    path: String,
    phase: Phase,
    #[source]
    kind: StreamErrorKind,
}

impl StreamError {
    pub(crate) fn new(path: impl Into<String>, kind: impl Into<StreamErrorKind>) -> Self {
        let kind = kind.into();
        let phase = match kind {
            StreamErrorKind::Open(_) => Phase::Open,
            StreamErrorKind::Unmappable(_) => Phase::SchemaDiscovery,
            StreamErrorKind::Read(_) => Phase::Read,
        };
        Self {
            path: path.into(),
            phase,
            kind,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn kind(&self) -> &StreamErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> StreamErrorKind {
        self.kind
    }
}

/// Configuration and stream discovery errors.
#[derive(Debug, Error)]
pub enum TapError {
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("config io error at '{path}': {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config must list at least one dataset path")]
    EmptyPaths,
    #[error("batch size must be greater than zero")]
    InvalidBatchSize,
    #[error("paths '{first}' and '{second}' both map to stream name '{name}'")]
    DuplicateStreamName {
        name: String,
        first: String,
        second: String,
    },
    #[error(transparent)]
    Stream(#[from] StreamError),
}
