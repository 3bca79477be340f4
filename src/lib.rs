//! Typed record extraction from Parquet datasets.
//!
//! A [`ParquetStream`] owns one dataset location (a file, a directory of
//! files or a glob). Opening it infers a [`PortableSchema`] from the Arrow
//! physical types; [`ParquetStream::read_records`] materializes the dataset,
//! recovers index columns kept only in metadata and yields one [`Record`]
//! per row in file order.
//!
//! ```no_run
//! use tap_parquet::ParquetStream;
//!
//! let stream = ParquetStream::open("users", "data/users.parquet")?;
//! println!("{}", stream.schema().to_json_schema());
//! for record in stream.read_records()? {
//!     let record = record?;
//!     println!("{}", serde_json::to_string(&record).unwrap());
//! }
//! # Ok::<(), tap_parquet::StreamError>(())
//! ```

mod observability;

/// Dataset resolution and materialization.
pub mod dataset;
/// Error types for every phase of a stream.
pub mod error;
/// Index column recovery from schema metadata.
pub mod index;
/// Type mapping and portable schemas.
pub mod schema;
/// Streams and record iteration.
pub mod stream;
/// Configuration and stream discovery.
pub mod tap;
/// Scalar values and records.
pub mod value;

pub use crate::{
    dataset::DatasetHandle,
    error::{
        DatasetOpenError, DatasetReadError, Phase, StreamError, StreamErrorKind, TapError,
        UnmappableTypeError, ValueError,
    },
    index::{IndexColumn, IndexMetadata},
    schema::{map_type, physical_type_tag, PhysicalColumn, PortableSchema, PortableType},
    stream::{ParquetStream, RecordIter, StreamOptions},
    tap::{sanitize_stream_name, Tap, TapConfig},
    value::{Record, Value},
};
