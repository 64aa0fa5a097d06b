//! `csv2pq` converts delimited text files into Parquet and back, guided by an optional schema
//! file that declares column names, types and nullability.
//!
//! The primary entrypoint is [`convert::convert_path`], which picks the direction from the file
//! extensions (`.csv`/`.tsv`/`.txt` ↔ `.parquet`/`.pq`).
//!
//! ## Schema files
//!
//! One column per line, whitespace separated:
//!
//! ```text
//! objectId  bigint
//! ra        double
//! name      char(16)
//! flags     int      NULL
//! psfFlux   decimal(9,3) NULL
//! ```
//!
//! Supported types are `int`, `short`, `long`, `bigint`, `smallint`, `int8`, `int16`, `int32`,
//! `int64`, `float`, `double`, `float32`, `float64`, `bool`, `char(...)` and `decimal(p[,s])`.
//! The schema argument `hdr` takes column names from the data file's header row instead.
//!
//! ## Null integers
//!
//! Parquet writers fed from text cannot tell a null sentinel (`\N` by default) from a bad
//! integer. Every signed integer column declared `NULL` therefore gets a trailing boolean
//! `<name>_ISNULL` column; rows holding the sentinel write the configured replacement value
//! (`0` by default) and `true` in the flag. Converting back to CSV folds the flags into the
//! sentinel again.
//!
//! ```no_run
//! use csv2pq::convert::convert_path;
//! use csv2pq::schema::SchemaSource;
//! use csv2pq::Options;
//!
//! # fn main() -> Result<(), csv2pq::ConvertError> {
//! let opts = Options {
//!     nan_replacement: "-1".to_string(),
//!     ..Default::default()
//! };
//! let schema = SchemaSource::from_arg("objects.schema");
//! let stats = convert_path("objects.csv", "objects.parquet", &schema, &opts)?;
//! println!("rows={}", stats.rows);
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Every failure is fatal and belongs to a numbered category (see [`ConvertError::code`]). The
//! `csv2pq` binary prints `csv2pq: <message>` and exits with the category's code.
//!
//! ## Modules
//!
//! - [`schema`]: schema file parsing and the schema/data consistency check
//! - [`transcode`]: the row transcoder that adds `_ISNULL` flags
//! - [`convert`]: CSV ↔ Parquet conversion and observers
//! - [`options`]: conversion options
//! - [`types`]: schema data model
//! - [`error`]: the error taxonomy

pub mod convert;
pub mod error;
pub mod options;
pub mod schema;
pub mod transcode;
pub mod types;

pub use error::{ConvertError, ConvertResult};
pub use options::{Compression, Options};
