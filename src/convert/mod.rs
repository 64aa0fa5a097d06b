//! Conversion entrypoints and implementations.
//!
//! Most callers should use [`convert_path`] (from [`unified`]) which:
//!
//! - picks the direction (CSV → Parquet or Parquet → CSV) from the file extensions
//! - applies the output policy (`replace`, `skip_existing`) and optional verification
//! - optionally reports success/failure/alerts to a [`ConversionObserver`]
//!
//! Direction-specific functions are also available under:
//! - [`parquet`] (CSV in, Parquet out)
//! - [`csv`] (Parquet in, CSV out)

pub mod csv;
pub mod observability;
pub mod parquet;
pub mod unified;

pub use observability::{
    CompositeObserver, ConversionContext, ConversionEvent, ConversionObserver, ConversionSeverity,
    FileObserver, StdErrObserver,
};
pub use unified::{
    convert_path, default_output_path, ConversionDirection, ConversionFormat, ConversionRequest,
    ConversionStats,
};
