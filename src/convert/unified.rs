//! Unified conversion entrypoint.
//!
//! Most callers should use [`convert_path`], which picks the direction from the input and output
//! file extensions and reports the outcome to the configured
//! [`super::observability::ConversionObserver`].

use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, ConvertResult};
use crate::options::Options;
use crate::schema::SchemaSource;

use super::observability::{ConversionContext, ConversionSeverity};
use super::{csv, parquet};

/// File formats on either side of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionFormat {
    /// Delimited text.
    Csv,
    /// Apache Parquet.
    Parquet,
}

impl ConversionFormat {
    /// Parse a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Some(Self::Csv),
            "parquet" | "pq" => Some(Self::Parquet),
            _ => None,
        }
    }

    /// Format of `path`, judged by its extension.
    pub fn from_path(path: &Path) -> ConvertResult<Self> {
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| ConvertError::invalid("file extension", path.display().to_string()))
    }

    /// Extension used for generated output names.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

/// Which way a conversion runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionDirection {
    /// CSV in, Parquet out.
    CsvToParquet,
    /// Parquet in, CSV out.
    ParquetToCsv,
}

impl ConversionDirection {
    /// Direction implied by the input and output paths.
    pub fn for_paths(input: &Path, output: &Path) -> ConvertResult<Self> {
        match (ConversionFormat::from_path(input)?, ConversionFormat::from_path(output)?) {
            (ConversionFormat::Csv, ConversionFormat::Parquet) => Ok(Self::CsvToParquet),
            (ConversionFormat::Parquet, ConversionFormat::Csv) => Ok(Self::ParquetToCsv),
            _ => Err(ConvertError::invalid(
                "conversion",
                format!("{} -> {}", input.display(), output.display()),
            )),
        }
    }

    /// Format of the files this direction writes.
    pub fn output_format(self) -> ConversionFormat {
        match self {
            Self::CsvToParquet => ConversionFormat::Parquet,
            Self::ParquetToCsv => ConversionFormat::Csv,
        }
    }
}

/// Minimal stats reported on successful conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionStats {
    /// Number of data rows written.
    pub rows: usize,
    /// Number of columns written (including `_ISNULL` flag columns).
    pub columns: usize,
    /// The output already existed and the input was skipped.
    pub skipped: bool,
}

impl ConversionStats {
    pub(crate) fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Convert `input` into `output`, choosing the direction from the file extensions.
///
/// `schema` only applies to CSV input. When an observer is configured, this function reports:
///
/// - `on_success` on success (including skipped outputs), with row/column stats
/// - `on_failure` on failure, with a computed severity
/// - `on_alert` on failure when the computed severity is >= `options.alert_at_or_above`
///
/// ```no_run
/// use csv2pq::convert::convert_path;
/// use csv2pq::schema::SchemaSource;
/// use csv2pq::Options;
///
/// # fn main() -> Result<(), csv2pq::ConvertError> {
/// let opts = Options {
///     verify: true,
///     ..Default::default()
/// };
/// let stats = convert_path("objects.csv", "objects.parquet", &SchemaSource::from_arg("objects.schema"), &opts)?;
/// println!("rows={}", stats.rows);
/// # Ok(())
/// # }
/// ```
pub fn convert_path(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    schema: &SchemaSource,
    options: &Options,
) -> ConvertResult<ConversionStats> {
    let input = input.as_ref();
    let output = output.as_ref();
    let direction = ConversionDirection::for_paths(input, output)?;

    let ctx = ConversionContext {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        direction,
    };

    let result = match direction {
        ConversionDirection::CsvToParquet => parquet::csv_to_parquet(input, output, schema, options),
        ConversionDirection::ParquetToCsv => csv::parquet_to_csv(input, output, options),
    };

    if let Some(obs) = options.observer.as_ref() {
        match &result {
            Ok(stats) => obs.on_success(&ctx, *stats),
            Err(e) => {
                let sev = severity_for_error(e);
                obs.on_failure(&ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(&ctx, sev, e);
                }
            }
        }
    }

    result
}

/// Output path for `input` when writing into directory `dir`: `<dir>/<stem>.<ext>`.
pub fn default_output_path(input: &Path, dir: &Path, format: ConversionFormat) -> PathBuf {
    let mut name = input.file_stem().unwrap_or(input.as_os_str()).to_os_string();
    name.push(".");
    name.push(format.extension());
    dir.join(name)
}

/// Decide what to do with an existing output file. Returns `true` when the input is skipped.
pub(crate) fn prepare_output(output: &Path, options: &Options) -> ConvertResult<bool> {
    if !output.exists() {
        return Ok(false);
    }
    if options.skip_existing {
        return Ok(true);
    }
    if !options.replace {
        return Err(ConvertError::Inconsistent(format!(
            "Output file {} already exists",
            output.display()
        )));
    }
    Ok(false)
}

fn severity_for_error(e: &ConvertError) -> ConversionSeverity {
    match e {
        ConvertError::Io { .. } => ConversionSeverity::Critical,
        ConvertError::Csv { source, .. } => match source.kind() {
            ::csv::ErrorKind::Io(_) => ConversionSeverity::Critical,
            _ => ConversionSeverity::Error,
        },
        // Codec errors often wrap I/O, but not always in a structured way.
        ConvertError::Arrow { source, .. } => {
            if matches!(source, arrow::error::ArrowError::IoError(..)) || error_chain_contains_io(source) {
                ConversionSeverity::Critical
            } else {
                ConversionSeverity::Error
            }
        }
        ConvertError::Parquet { source, .. } => {
            if error_chain_contains_io(source) {
                ConversionSeverity::Critical
            } else {
                ConversionSeverity::Error
            }
        }
        ConvertError::Inconsistent(_)
        | ConvertError::MissingValue(_)
        | ConvertError::InvalidValue { .. }
        | ConvertError::UnknownType { .. }
        | ConvertError::MutuallyExclusive(..) => ConversionSeverity::Error,
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}

/// Convenience helper for callers that want an owned request object.
///
/// Multi-file runs build one request per input.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Path to the input file.
    pub input: PathBuf,
    /// Path to the output file.
    pub output: PathBuf,
    /// Schema for CSV input.
    pub schema: SchemaSource,
    /// Options controlling conversion.
    pub options: Options,
}

impl ConversionRequest {
    /// Execute the request by calling [`convert_path`].
    pub fn run(&self) -> ConvertResult<ConversionStats> {
        convert_path(&self.input, &self.output, &self.schema, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_follows_extensions() {
        assert_eq!(
            ConversionDirection::for_paths(Path::new("a.csv"), Path::new("b.pq")).unwrap(),
            ConversionDirection::CsvToParquet
        );
        assert_eq!(
            ConversionDirection::for_paths(Path::new("a.PARQUET"), Path::new("b.txt")).unwrap(),
            ConversionDirection::ParquetToCsv
        );
        let err = ConversionDirection::for_paths(Path::new("a.csv"), Path::new("b.csv")).unwrap_err();
        assert_eq!(err.code(), 3);
        let err = ConversionDirection::for_paths(Path::new("a.json"), Path::new("b.pq")).unwrap_err();
        assert_eq!(err.code(), 3);
    }

    #[test]
    fn default_output_path_swaps_extension() {
        let out = default_output_path(Path::new("/data/in/run1.csv"), Path::new("/tmp/out"), ConversionFormat::Parquet);
        assert_eq!(out, PathBuf::from("/tmp/out/run1.parquet"));
        let out = default_output_path(Path::new("night.2024.pq"), Path::new("out"), ConversionFormat::Csv);
        assert_eq!(out, PathBuf::from("out/night.2024.csv"));
    }

    #[test]
    fn io_errors_are_critical() {
        let err = ConvertError::io("x", std::io::Error::other("disk"));
        assert_eq!(severity_for_error(&err), ConversionSeverity::Critical);
        let err = ConvertError::Inconsistent("x".into());
        assert_eq!(severity_for_error(&err), ConversionSeverity::Error);
    }

    #[test]
    fn request_debug_lists_paths_and_options() {
        let request = ConversionRequest {
            input: PathBuf::from("in.csv"),
            output: PathBuf::from("out.parquet"),
            schema: SchemaSource::Header,
            options: Options::default(),
        };
        let shown = format!("{request:?}");
        assert!(shown.starts_with("ConversionRequest {"));
        assert!(shown.contains("\"in.csv\""));
        assert!(shown.contains("schema: Header"));
        assert!(shown.contains("observer_set: false"));
    }
}
