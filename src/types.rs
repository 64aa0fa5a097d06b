//! Core data model types for schema-driven conversion.
//!
//! A [`Schema`] is built once from a schema file (or deferred to the data file's header row) and
//! is read-only afterwards. It carries the ordered [`ColumnSpec`]s, the name → [`ColumnType`] map
//! and the list of [`NullCheck`]s the row transcoder applies to every row.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema as ArrowSchema, SchemaRef};

use crate::error::{ConvertError, ConvertResult};

/// Suffix of the synthetic boolean column appended for each nullable integer column.
pub const ISNULL_SUFFIX: &str = "_ISNULL";

/// Resolved primitive type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point number.
    Float32,
    /// 64-bit floating point number.
    Float64,
    /// Byte string (`char(n)` columns).
    Bytes,
    /// Boolean.
    Bool,
}

impl ColumnType {
    /// Lower-case name used in schema displays.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Bytes => "bytes",
            Self::Bool => "bool",
        }
    }

    /// True for the signed integer widths, the only types that get an `_ISNULL` companion.
    pub fn is_signed_integer(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Arrow type the codec reads and writes for this column.
    pub fn arrow_type(self) -> DataType {
        match self {
            Self::Int8 => DataType::Int8,
            Self::Int16 => DataType::Int16,
            Self::Int32 => DataType::Int32,
            Self::Int64 => DataType::Int64,
            Self::Float32 => DataType::Float32,
            Self::Float64 => DataType::Float64,
            Self::Bytes => DataType::Utf8,
            Self::Bool => DataType::Boolean,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared column of a schema file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Type spelling as written in the schema file, if any.
    pub declared_type: Option<String>,
    /// Resolved type; `None` for untyped (auto-typed) columns.
    pub resolved_type: Option<ColumnType>,
    /// Whether the schema line carried a `NULL` clause.
    pub nullable: bool,
}

impl ColumnSpec {
    /// An untyped column whose type is left to data inference.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
            resolved_type: None,
            nullable: false,
        }
    }

    /// A typed column.
    pub fn typed(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        resolved_type: ColumnType,
        nullable: bool,
    ) -> Self {
        Self {
            name: name.into(),
            declared_type: Some(declared_type.into()),
            resolved_type: Some(resolved_type),
            nullable,
        }
    }

    /// True when this column's null sentinel must be rewritten into a companion flag.
    pub fn needs_null_check(&self) -> bool {
        self.nullable && self.resolved_type.is_some_and(ColumnType::is_signed_integer)
    }
}

/// A column whose null sentinel is replaced and flagged in a synthetic boolean column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullCheck {
    /// Position of the original column among the declared columns.
    pub index: usize,
    /// Name of the appended boolean column (`<name>_ISNULL`).
    pub flag_name: String,
}

/// Column metadata shared by the consistency check, the transcoder and the codec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    /// Declared columns in file order.
    pub columns: Vec<ColumnSpec>,
    /// Name → type for every typed column, including synthetic flag columns.
    pub types: HashMap<String, ColumnType>,
    /// Columns requiring null-sentinel substitution, in declaration order.
    pub null_checks: Vec<NullCheck>,
    /// Column names come from the data file's header row; no typing.
    pub from_header: bool,
}

impl Schema {
    /// Build a schema from declared columns, registering types and `_ISNULL` companions.
    ///
    /// Duplicate column names are rejected.
    pub fn from_columns(columns: Vec<ColumnSpec>) -> ConvertResult<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        let mut types = HashMap::with_capacity(columns.len());
        let mut null_checks = Vec::new();

        for (index, col) in columns.iter().enumerate() {
            if !seen.insert(col.name.as_str()) {
                return Err(ConvertError::Inconsistent(format!(
                    "Column \"{}\" is defined more than once",
                    col.name
                )));
            }
            if let Some(ty) = col.resolved_type {
                types.insert(col.name.clone(), ty);
            }
            if col.needs_null_check() {
                null_checks.push(NullCheck {
                    index,
                    flag_name: format!("{}{ISNULL_SUFFIX}", col.name),
                });
            }
        }

        for check in &null_checks {
            if seen.contains(check.flag_name.as_str()) {
                return Err(ConvertError::Inconsistent(format!(
                    "Column \"{}\" collides with a generated null flag column",
                    check.flag_name
                )));
            }
            types.insert(check.flag_name.clone(), ColumnType::Bool);
        }

        Ok(Self {
            columns,
            types,
            null_checks,
            from_header: false,
        })
    }

    /// Deferred schema: names are taken from the data file's first row.
    pub fn header_deferred() -> Self {
        Self {
            from_header: true,
            ..Self::default()
        }
    }

    /// Untyped schema from header names.
    pub fn from_header_names<I, S>(names: I) -> ConvertResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = names.into_iter().map(|n| ColumnSpec::untyped(n)).collect();
        let mut schema = Self::from_columns(columns)?;
        schema.from_header = true;
        Ok(schema)
    }

    /// Number of columns in converted output (declared plus flag columns).
    pub fn output_width(&self) -> usize {
        self.columns.len() + self.null_checks.len()
    }

    /// Output column names: declared columns followed by flag columns.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.null_checks.iter().map(|n| n.flag_name.as_str()))
    }

    /// Resolved type of an output column, if known.
    pub fn type_of(&self, name: &str) -> Option<ColumnType> {
        self.types.get(name).copied()
    }

    /// True when some column type must come from the data itself.
    pub fn needs_inference(&self) -> bool {
        self.from_header || self.columns.iter().any(|c| c.resolved_type.is_none())
    }

    /// Arrow schema of the converted output.
    ///
    /// Untyped columns take the type found at the same position of `inferred`, which must then
    /// be supplied and cover the flag columns too. Declared columns are nullable; flag columns never are.
    pub fn arrow_schema(&self, inferred: Option<&ArrowSchema>) -> ConvertResult<SchemaRef> {
        if let Some(inferred) = inferred {
            if inferred.fields().len() != self.output_width() {
                return Err(ConvertError::Inconsistent(format!(
                    "Schema with {} cols does not match the data with {} cols",
                    self.columns.len(),
                    inferred.fields().len().saturating_sub(self.null_checks.len())
                )));
            }
        }

        let mut fields = Vec::with_capacity(self.output_width());
        for (i, col) in self.columns.iter().enumerate() {
            let data_type = match (col.resolved_type, inferred) {
                (Some(ty), _) => ty.arrow_type(),
                (None, Some(inferred)) => inferred.field(i).data_type().clone(),
                (None, None) => {
                    return Err(ConvertError::MissingValue(format!(
                        "Type of column \"{}\"",
                        col.name
                    )));
                }
            };
            fields.push(Field::new(col.name.as_str(), data_type, true));
        }
        for check in &self.null_checks {
            fields.push(Field::new(check.flag_name.as_str(), DataType::Boolean, false));
        }

        Ok(Arc::new(ArrowSchema::new(fields)))
    }

    /// Tabular rendering used by the schema display mode.
    pub fn display(&self) -> SchemaDisplay<'_> {
        SchemaDisplay(self)
    }
}

/// Formats a [`Schema`] as `<pos> <name> <declared> [-> <resolved>]` lines.
pub struct SchemaDisplay<'a>(&'a Schema);

impl fmt::Display for SchemaDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schema = self.0;
        let pos_width = schema.output_width().to_string().len();
        let name_width = schema.column_names().map(str::len).max().unwrap_or(0);

        let mut pos = 0;
        for col in &schema.columns {
            let declared = col.declared_type.as_deref().unwrap_or("auto");
            match col.resolved_type {
                Some(ty) if !declared.eq_ignore_ascii_case(ty.as_str()) => writeln!(
                    f,
                    "{pos:>pos_width$} {name:<name_width$} {declared} -> {ty}",
                    name = col.name
                )?,
                _ => writeln!(
                    f,
                    "{pos:>pos_width$} {name:<name_width$} {declared}",
                    name = col.name
                )?,
            }
            pos += 1;
        }
        for check in &schema.null_checks {
            writeln!(
                f,
                "{pos:>pos_width$} {name:<name_width$} bool",
                name = check.flag_name
            )?;
            pos += 1;
        }
        Ok(())
    }
}
