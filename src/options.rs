//! Conversion options.
//!
//! [`Options`] is populated once (from defaults, a JSON config file, `key=value` overrides or
//! the command line) and never mutated by the conversion core. Keys accepted by
//! [`Options::set`]:
//!
//! | key   | field                        | kind  |
//! |-------|------------------------------|-------|
//! | `cmt` | [`Options::comment`]         | value |
//! | `nil` | [`Options::null_sentinel`]   | value |
//! | `nan` | [`Options::nan_replacement`] | value |
//! | `sep` | [`Options::separator`]       | value |
//! | `hdr` | [`Options::has_header`]      | flag  |
//! | `ato` | [`Options::auto_type`]       | flag  |
//! | `dsp` | [`Options::display_schema`]  | flag  |
//! | `cmp` | [`Options::compression`]     | value |
//! | `bsz` | [`Options::batch_size`]      | value |
//! | `rep` | [`Options::replace`]         | flag  |
//! | `skp` | [`Options::skip_existing`]   | flag  |
//! | `vfy` | [`Options::verify`]          | flag  |

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use parquet::basic::{Compression as ParquetCompression, ZstdLevel};
use serde::{Deserialize, Serialize};

use crate::convert::observability::{ConversionObserver, ConversionSeverity};
use crate::error::{ConvertError, ConvertResult};

/// Parquet compression codec for written files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression.
    None,
    /// Snappy (default).
    #[default]
    Snappy,
    /// Zstandard at its default level.
    Zstd,
}

impl Compression {
    pub(crate) fn to_parquet(self) -> ParquetCompression {
        match self {
            Self::None => ParquetCompression::UNCOMPRESSED,
            Self::Snappy => ParquetCompression::SNAPPY,
            Self::Zstd => ParquetCompression::ZSTD(ZstdLevel::default()),
        }
    }
}

impl FromStr for Compression {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "uncompressed" => Ok(Self::None),
            "snappy" => Ok(Self::Snappy),
            "zstd" => Ok(Self::Zstd),
            _ => Err(ConvertError::invalid("compression", s)),
        }
    }
}

/// Options controlling schema parsing, row transcoding and conversion.
///
/// Use [`Default`] for common cases.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Rows whose first field starts with this character are passed through untouched.
    pub comment: Option<char>,
    /// Text that denotes a null value in the CSV data.
    pub null_sentinel: String,
    /// Text substituted for the null sentinel in nullable integer columns.
    pub nan_replacement: String,
    /// Field separator (a single ASCII character).
    pub separator: char,
    /// The data file's first row holds column names.
    pub has_header: bool,
    /// Ignore schema types and let the codec infer them from the data.
    pub auto_type: bool,
    /// Print the parsed schema to stdout.
    pub display_schema: bool,
    /// Compression used when writing Parquet.
    pub compression: Compression,
    /// Rows per Arrow record batch.
    pub batch_size: usize,
    /// Overwrite existing output files.
    pub replace: bool,
    /// Skip inputs whose output file already exists.
    pub skip_existing: bool,
    /// Re-read written Parquet files and check their row count.
    pub verify: bool,
    /// Optional observer for logging/alerts.
    #[serde(skip)]
    pub observer: Option<Arc<dyn ConversionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    #[serde(skip, default = "default_alert_threshold")]
    pub alert_at_or_above: ConversionSeverity,
}

fn default_alert_threshold() -> ConversionSeverity {
    ConversionSeverity::Critical
}

impl Default for Options {
    fn default() -> Self {
        Self {
            comment: None,
            null_sentinel: "\\N".to_string(),
            nan_replacement: "0".to_string(),
            separator: ',',
            has_header: false,
            auto_type: false,
            display_schema: false,
            compression: Compression::default(),
            batch_size: 8_192,
            replace: false,
            skip_existing: false,
            verify: false,
            observer: None,
            alert_at_or_above: default_alert_threshold(),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("comment", &self.comment)
            .field("null_sentinel", &self.null_sentinel)
            .field("nan_replacement", &self.nan_replacement)
            .field("separator", &self.separator)
            .field("has_header", &self.has_header)
            .field("auto_type", &self.auto_type)
            .field("display_schema", &self.display_schema)
            .field("compression", &self.compression)
            .field("batch_size", &self.batch_size)
            .field("replace", &self.replace)
            .field("skip_existing", &self.skip_existing)
            .field("verify", &self.verify)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Options {
    /// Load options from a JSON file. Missing keys keep their defaults.
    pub fn from_json_path(path: impl AsRef<Path>) -> ConvertResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConvertError::io(format!("Unable to open config file {}", path.display()), e)
        })?;
        serde_json::from_str(&text)
            .map_err(|e| ConvertError::invalid("config file", format!("{}: {e}", path.display())))
    }

    /// Apply one `key[=value]` setting.
    ///
    /// Flag keys accept no value (meaning `true`) or a boolean spelling. Value keys require a
    /// value; `nil` and `nan` accept the empty string.
    pub fn set(&mut self, key: &str, value: Option<&str>) -> ConvertResult<()> {
        match key {
            "hdr" => self.has_header = parse_flag(key, value)?,
            "ato" => self.auto_type = parse_flag(key, value)?,
            "dsp" => self.display_schema = parse_flag(key, value)?,
            "rep" => self.replace = parse_flag(key, value)?,
            "skp" => self.skip_existing = parse_flag(key, value)?,
            "vfy" => self.verify = parse_flag(key, value)?,
            "cmt" => self.comment = Some(parse_char("comment character", required(key, value)?)?),
            "sep" => self.separator = parse_char("field separator", required(key, value)?)?,
            "nil" => self.null_sentinel = required(key, value)?.to_string(),
            "nan" => self.nan_replacement = required(key, value)?.to_string(),
            "cmp" => self.compression = required(key, value)?.parse()?,
            "bsz" => {
                let raw = required(key, value)?;
                self.batch_size = raw
                    .parse()
                    .map_err(|_| ConvertError::invalid("batch size", raw))?;
            }
            _ => return Err(ConvertError::invalid("option", key)),
        }
        Ok(())
    }

    /// Apply a `key=value` (or bare `key`) assignment as accepted by [`Options::set`].
    pub fn set_assignment(&mut self, assignment: &str) -> ConvertResult<()> {
        match assignment.split_once('=') {
            Some((key, value)) => self.set(key.trim(), Some(value)),
            None => self.set(assignment.trim(), None),
        }
    }

    /// Check option combinations before any file is touched.
    pub fn validate(&self) -> ConvertResult<()> {
        if !is_single_byte(self.separator) {
            return Err(ConvertError::invalid(
                "field separator",
                self.separator.to_string(),
            ));
        }
        if let Some(c) = self.comment {
            if !is_single_byte(c) || c == self.separator {
                return Err(ConvertError::invalid("comment character", c.to_string()));
            }
        }
        if self.batch_size == 0 {
            return Err(ConvertError::invalid("batch size", "0"));
        }
        if self.replace && self.skip_existing {
            return Err(ConvertError::MutuallyExclusive(
                "replace".to_string(),
                "skip".to_string(),
            ));
        }
        Ok(())
    }

    /// Separator as the byte handed to the tokenizers. Only meaningful after [`Options::validate`].
    pub fn separator_byte(&self) -> u8 {
        self.separator as u8
    }

    /// Comment prefix as a byte. Only meaningful after [`Options::validate`].
    pub fn comment_byte(&self) -> Option<u8> {
        self.comment.map(|c| c as u8)
    }
}

fn is_single_byte(c: char) -> bool {
    c.is_ascii() && c != '\n' && c != '\r'
}

fn required<'a>(key: &str, value: Option<&'a str>) -> ConvertResult<&'a str> {
    value.ok_or_else(|| ConvertError::MissingValue(format!("{key} value")))
}

fn parse_char(item: &str, raw: &str) -> ConvertResult<char> {
    let raw = match raw {
        "\\t" | "tab" => "\t",
        other => other,
    };
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ConvertError::invalid(item, raw)),
    }
}

fn parse_flag(key: &str, value: Option<&str>) -> ConvertResult<bool> {
    let Some(raw) = value else {
        return Ok(true);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err(ConvertError::invalid(key, raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_accepts_tab_spellings_for_separator() {
        let mut opts = Options::default();
        opts.set("sep", Some("\\t")).unwrap();
        assert_eq!(opts.separator, '\t');
        opts.set("sep", Some("tab")).unwrap();
        assert_eq!(opts.separator_byte(), b'\t');
    }

    #[test]
    fn flags_default_to_true_without_value() {
        let mut opts = Options::default();
        opts.set_assignment("hdr").unwrap();
        opts.set_assignment("vfy=no").unwrap();
        assert!(opts.has_header);
        assert!(!opts.verify);
    }
}
