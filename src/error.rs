use thiserror::Error;

/// Program name used as the prefix of every fatal message.
pub const PROGRAM: &str = "csv2pq";

/// Process exit code used for wrapped I/O and codec failures (code 0 of the taxonomy).
pub const WRAPPED_EXIT_CODE: i32 = 99;

/// Convenience result type for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Error type returned by schema parsing, row transcoding and conversion.
///
/// Every variant is fatal. Each one belongs to a numbered category (see [`ConvertError::code`])
/// whose message template is stable, so scripts can rely on both the text and the exit code.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Underlying I/O error with the operation that failed.
    #[error("{context}; {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    /// CSV tokenizer error with the operation that failed.
    #[error("{context}; {source}")]
    Csv { context: String, source: csv::Error },

    /// Arrow codec error with the operation that failed.
    #[error("{context}; {source}")]
    Arrow {
        context: String,
        source: arrow::error::ArrowError,
    },

    /// Parquet codec error with the operation that failed.
    #[error("{context}; {source}")]
    Parquet {
        context: String,
        source: parquet::errors::ParquetError,
    },

    /// The schema and the data (or two settings) disagree.
    #[error("{0}.")]
    Inconsistent(String),

    /// A required value was not supplied.
    #[error("{0} not specified.")]
    MissingValue(String),

    /// A value was supplied for `item` but cannot be used.
    #[error("Invalid {item} \"{value}\".")]
    InvalidValue { item: String, value: String },

    /// A schema line names a type outside the supported vocabulary.
    #[error("Column \"{column}\" has an unknown type \"{type_name}\".")]
    UnknownType { column: String, type_name: String },

    /// Two options that cannot be combined were both supplied.
    #[error("\"{0}\" and \"{1}\" are mutually exclusive.")]
    MutuallyExclusive(String, String),
}

impl ConvertError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn csv(context: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            context: context.into(),
            source,
        }
    }

    pub fn arrow(context: impl Into<String>, source: arrow::error::ArrowError) -> Self {
        Self::Arrow {
            context: context.into(),
            source,
        }
    }

    pub fn parquet(context: impl Into<String>, source: parquet::errors::ParquetError) -> Self {
        Self::Parquet {
            context: context.into(),
            source,
        }
    }

    pub fn invalid(item: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            item: item.into(),
            value: value.into(),
        }
    }

    /// Stable message number of this error's category.
    ///
    /// - 0: wrapped I/O or codec failure
    /// - 1: generic inconsistency
    /// - 2: required value missing
    /// - 3: invalid value
    /// - 4: unknown column type
    /// - 5: mutually exclusive options
    pub fn code(&self) -> u8 {
        match self {
            Self::Io { .. } | Self::Csv { .. } | Self::Arrow { .. } | Self::Parquet { .. } => 0,
            Self::Inconsistent(_) => 1,
            Self::MissingValue(_) => 2,
            Self::InvalidValue { .. } => 3,
            Self::UnknownType { .. } => 4,
            Self::MutuallyExclusive(..) => 5,
        }
    }

    /// Process exit code for this error. Code 0 maps to [`WRAPPED_EXIT_CODE`].
    pub fn exit_code(&self) -> i32 {
        match self.code() {
            0 => WRAPPED_EXIT_CODE,
            n => i32::from(n),
        }
    }

    /// The single line written to stderr for this error.
    pub fn diagnostic(&self) -> String {
        format!("{PROGRAM}: {self}")
    }
}

/// Report `err` on stderr and terminate the process with its exit code.
pub fn fatal(err: &ConvertError) -> ! {
    eprintln!("{}", err.diagnostic());
    std::process::exit(err.exit_code())
}
