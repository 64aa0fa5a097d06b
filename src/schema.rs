//! Schema file parsing and the schema/data consistency check.
//!
//! A schema file holds one column per line:
//!
//! ```text
//! <columnName> [<type> [<nullability tokens...>]]
//! ```
//!
//! Types are resolved against a fixed vocabulary (plus `char(...)` and `decimal(p[,s])`). A
//! signed integer column whose trailing tokens contain `NULL` (and not `NOT`) gets a synthetic
//! `<name>_ISNULL` boolean column appended after all declared columns.
//!
//! ```rust
//! use csv2pq::schema::parse_schema_str;
//! use csv2pq::types::ColumnType;
//! use csv2pq::Options;
//!
//! let schema = parse_schema_str("id int\nname char(10)\nhits smallint NULL\n", &Options::default())?;
//! assert_eq!(schema.type_of("hits_ISNULL"), Some(ColumnType::Bool));
//! assert_eq!(schema.null_checks[0].index, 2);
//! # Ok::<(), csv2pq::ConvertError>(())
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, ConvertResult};
use crate::options::Options;
use crate::types::{ColumnSpec, ColumnType, Schema};

/// Schema argument value that selects header-row mode.
pub const HEADER_SCHEMA: &str = "hdr";

/// Where column metadata comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// A schema description file.
    File(PathBuf),
    /// The data file's own header row (no typing).
    Header,
}

impl SchemaSource {
    /// Interpret a schema argument; [`HEADER_SCHEMA`] selects header mode.
    pub fn from_arg(arg: &str) -> Self {
        if arg == HEADER_SCHEMA {
            Self::Header
        } else {
            Self::File(PathBuf::from(arg))
        }
    }
}

/// Parse the schema named by `source`.
///
/// Header mode returns [`Schema::header_deferred`]. When `options.display_schema` is set the
/// parsed schema is printed to stdout.
pub fn parse_schema(source: &SchemaSource, options: &Options) -> ConvertResult<Schema> {
    let path = match source {
        SchemaSource::Header => return Ok(Schema::header_deferred()),
        SchemaSource::File(path) => path,
    };

    let text = std::fs::read_to_string(path).map_err(|e| {
        ConvertError::io(format!("Unable to open schema file {}", path.display()), e)
    })?;
    let schema = parse_schema_str(&text, options)?;

    if options.display_schema && !schema.columns.is_empty() {
        print!("{}", schema.display());
    }
    Ok(schema)
}

/// Parse schema text (the contents of a schema file).
pub fn parse_schema_str(text: &str, options: &Options) -> ConvertResult<Schema> {
    let mut columns = Vec::new();
    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, rest)) = tokens.split_first() else {
            continue;
        };
        match rest.split_first() {
            Some((&type_token, null_tokens)) if !options.auto_type => {
                let resolved = resolve_type(name, type_token)?;
                columns.push(ColumnSpec::typed(
                    name,
                    type_token,
                    resolved,
                    is_nullable(null_tokens),
                ));
            }
            _ => columns.push(ColumnSpec::untyped(name)),
        }
    }
    Schema::from_columns(columns)
}

/// Resolve a schema type token for `column`.
///
/// Matching is case-insensitive; the error names the token as written.
pub fn resolve_type(column: &str, type_token: &str) -> ConvertResult<ColumnType> {
    let lowered = type_token.to_ascii_lowercase();

    let resolved = if lowered.starts_with("char") {
        Some(ColumnType::Bytes)
    } else if let Some(args) = lowered.strip_prefix("decimal(") {
        parse_decimal_args(args).map(|(precision, scale)| resolve_decimal(precision, scale))
    } else {
        lookup_type(&lowered)
    };

    resolved.ok_or_else(|| ConvertError::UnknownType {
        column: column.to_string(),
        type_name: type_token.to_string(),
    })
}

/// Map `decimal(precision, scale)` to the narrowest integer (scale 0) or a float.
pub fn resolve_decimal(precision: u32, scale: u32) -> ColumnType {
    if scale == 0 {
        match precision {
            0..=2 => ColumnType::Int8,
            3..=4 => ColumnType::Int16,
            5..=9 => ColumnType::Int32,
            _ => ColumnType::Int64,
        }
    } else if precision < 7 {
        ColumnType::Float32
    } else {
        ColumnType::Float64
    }
}

/// True when the trailing tokens of a schema line declare the column nullable.
pub fn is_nullable(tokens: &[&str]) -> bool {
    let clause = tokens.join(" ").to_ascii_uppercase();
    clause.contains("NULL") && !clause.contains("NOT")
}

fn lookup_type(name: &str) -> Option<ColumnType> {
    let ty = match name {
        "int" | "int32" => ColumnType::Int32,
        "short" | "smallint" | "int16" => ColumnType::Int16,
        "long" | "bigint" | "int64" => ColumnType::Int64,
        "int8" => ColumnType::Int8,
        "float" | "float32" => ColumnType::Float32,
        "double" | "float64" => ColumnType::Float64,
        "bool" => ColumnType::Bool,
        _ => return None,
    };
    Some(ty)
}

// `args` is the text after `decimal(`, e.g. `10,2)` or `5)`.
fn parse_decimal_args(args: &str) -> Option<(u32, u32)> {
    let end = args.find(')')?;
    let mut parts = args[..end].split(',');
    let precision = parts.next()?.trim().parse().ok()?;
    let scale = match parts.next() {
        Some(s) => s.trim().parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((precision, scale))
}

/// Fail unless the first record of `data_path` has as many fields as `schema` declares.
///
/// Header-mode schemas have nothing to compare and always pass.
pub fn check_consistency(data_path: &Path, schema: &Schema, options: &Options) -> ConvertResult<()> {
    if schema.from_header {
        return Ok(());
    }

    let first = read_first_record(data_path, options)?;
    let expected = schema.columns.len();
    if first.len() != expected {
        return Err(ConvertError::Inconsistent(format!(
            "Schema with {expected} cols does not match the data with {} cols",
            first.len()
        )));
    }
    Ok(())
}

/// Build the untyped schema of header mode from the data file's first row.
pub fn header_schema(data_path: &Path, options: &Options) -> ConvertResult<Schema> {
    let names = read_first_record(data_path, options)?;
    Schema::from_header_names(names.iter())
}

fn read_first_record(data_path: &Path, options: &Options) -> ConvertResult<csv::StringRecord> {
    let context = || format!("Unable to read input file {}", data_path.display());

    let file = File::open(data_path).map_err(|e| ConvertError::io(context(), e))?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .delimiter(options.separator_byte())
        .comment(options.comment_byte())
        .from_reader(file);

    let mut record = csv::StringRecord::new();
    match rdr.read_record(&mut record) {
        Ok(true) => Ok(record),
        Ok(false) => Err(ConvertError::io(
            context(),
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "file has no rows"),
        )),
        Err(e) => Err(ConvertError::csv(context(), e)),
    }
}
