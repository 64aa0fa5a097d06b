//! Row transcoder: rewrites CSV rows so a strongly typed reader can ingest them.
//!
//! For every [`NullCheck`] of the schema, a row gets one trailing `true`/`false` token telling
//! whether the checked column held the null sentinel; the sentinel itself is replaced by the
//! configured NaN text. Rows are pulled one at a time with [`RowTranscoder::next_row`], or
//! consumed as a byte stream through the [`Read`] impl.
//!
//! Input quotes are literal text. `next_row` returns the tokens joined as they are; the byte
//! stream wraps any field holding a `"` in quotes (doubling the inner ones) so that a quoting
//! CSV reader downstream recovers the same text.
//!
//! ```no_run
//! use csv2pq::schema::parse_schema_str;
//! use csv2pq::transcode::RowTranscoder;
//! use csv2pq::Options;
//!
//! # fn main() -> Result<(), csv2pq::ConvertError> {
//! let opts = Options::default();
//! let schema = parse_schema_str("id int\nage int NULL\n", &opts)?;
//! let mut rows = RowTranscoder::open("people.csv", &schema, &opts)?;
//! loop {
//!     let row = rows.next_row()?;
//!     if row.is_empty() {
//!         break;
//!     }
//!     print!("{row}");
//! }
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, ConvertResult};
use crate::options::Options;
use crate::types::{NullCheck, Schema};

/// Lifecycle of a [`RowTranscoder`]. There is no way back from `Eof`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscoderState {
    /// Rows may still be read.
    Open,
    /// The end of the file was reached cleanly.
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowKind {
    Comment,
    Data,
}

/// Pull-based row source over one CSV file.
pub struct RowTranscoder {
    path: PathBuf,
    reader: csv::Reader<File>,
    record: csv::StringRecord,
    row: Vec<String>,
    encoder: csv::WriterBuilder,
    file_size: u64,
    null_checks: Vec<NullCheck>,
    separator: String,
    null_sentinel: String,
    nan_replacement: String,
    comment: Option<char>,
    header_pending: bool,
    rows: u64,
    state: TranscoderState,
    // Byte-stream side of the `Read` impl.
    pending: Vec<u8>,
    pending_pos: usize,
    error: Option<ConvertError>,
}

impl RowTranscoder {
    /// Open `path` for transcoding with the null checks of `schema`.
    pub fn open(path: impl AsRef<Path>, schema: &Schema, options: &Options) -> ConvertResult<Self> {
        let path = path.as_ref();
        let context = || format!("Unable to open input file {}", path.display());

        let file = File::open(path).map_err(|e| ConvertError::io(context(), e))?;
        let file_size = file
            .metadata()
            .map_err(|e| ConvertError::io(context(), e))?
            .len();

        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .delimiter(options.separator_byte())
            .from_reader(file);

        let mut encoder = csv::WriterBuilder::new();
        encoder
            .delimiter(options.separator_byte())
            .quote_style(csv::QuoteStyle::Necessary)
            .terminator(csv::Terminator::Any(b'\n'))
            .buffer_capacity(1024);

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            record: csv::StringRecord::new(),
            row: Vec::new(),
            encoder,
            file_size,
            null_checks: schema.null_checks.clone(),
            separator: options.separator.to_string(),
            null_sentinel: options.null_sentinel.clone(),
            nan_replacement: options.nan_replacement.clone(),
            comment: options.comment,
            header_pending: options.has_header || schema.from_header,
            rows: 0,
            state: TranscoderState::Open,
            pending: Vec::new(),
            pending_pos: 0,
            error: None,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TranscoderState {
        self.state
    }

    /// Number of rows returned so far (comment rows included).
    pub fn rows_read(&self) -> u64 {
        self.rows
    }

    /// Path of the file being transcoded.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the next row as delimited text with a trailing newline.
    ///
    /// An empty string means end of file. A read failure that does not sit exactly at the end
    /// of the file is reported as a corrupted row. Tokens are joined verbatim; quotes in the
    /// data are never interpreted or added.
    pub fn next_row(&mut self) -> ConvertResult<String> {
        if self.pull()?.is_none() {
            return Ok(String::new());
        }
        let mut line = self.row.join(self.separator.as_str());
        line.push('\n');
        Ok(line)
    }

    // Reads and augments the next record into `self.row`. `None` at end of file.
    fn pull(&mut self) -> ConvertResult<Option<RowKind>> {
        if self.state == TranscoderState::Eof {
            return Ok(None);
        }

        let failure = match self.reader.read_record(&mut self.record) {
            Ok(true) => None,
            Ok(false) => Some(ConvertError::io(
                self.row_context(),
                io::Error::new(io::ErrorKind::UnexpectedEof, "record ended before end of file"),
            )),
            Err(e) => Some(ConvertError::csv(self.row_context(), e)),
        };
        if let Some(err) = failure {
            if self.reader.position().byte() == self.file_size {
                self.state = TranscoderState::Eof;
                return Ok(None);
            }
            return Err(err);
        }

        let mut row = std::mem::take(&mut self.row);
        row.clear();
        row.extend(self.record.iter().map(str::to_owned));

        let kind = if self.is_comment(&row) {
            RowKind::Comment
        } else if self.header_pending {
            self.header_pending = false;
            row.extend(self.null_checks.iter().map(|c| c.flag_name.clone()));
            RowKind::Data
        } else {
            self.augment(&mut row)?;
            RowKind::Data
        };

        self.row = row;
        self.rows += 1;
        Ok(Some(kind))
    }

    // Serializes `self.row` for the codec, quoting fields that contain a quote character so a
    // quoting reader sees the literal text.
    fn encode_row(&mut self, kind: RowKind) -> ConvertResult<Vec<u8>> {
        let mut out = std::mem::take(&mut self.pending);
        out.clear();
        if kind == RowKind::Comment {
            out.extend_from_slice(self.row.join(self.separator.as_str()).as_bytes());
            out.push(b'\n');
            return Ok(out);
        }

        let context = || self.row_context_at(self.rows);
        let mut writer = self.encoder.from_writer(out);
        writer
            .write_record(&self.row)
            .map_err(|e| ConvertError::csv(context(), e))?;
        writer
            .into_inner()
            .map_err(|e| ConvertError::io(context(), io::Error::new(e.error().kind(), e.to_string())))
    }

    /// Take the error that ended a [`Read`] call, if any.
    pub fn take_error(&mut self) -> Option<ConvertError> {
        self.error.take()
    }

    fn augment(&self, row: &mut Vec<String>) -> ConvertResult<()> {
        let width = row.len();
        for check in &self.null_checks {
            if check.index >= width {
                return Err(ConvertError::Inconsistent(format!(
                    "Row {} in file {} has {width} cols but column {} is required",
                    self.rows + 1,
                    self.path.display(),
                    check.index + 1
                )));
            }
            if row[check.index] == self.null_sentinel {
                row[check.index].clone_from(&self.nan_replacement);
                row.push("true".to_string());
            } else {
                row.push("false".to_string());
            }
        }
        Ok(())
    }

    fn is_comment(&self, row: &[String]) -> bool {
        match (self.comment, row.first()) {
            (Some(c), Some(first)) => first.starts_with(c),
            _ => false,
        }
    }

    fn row_context(&self) -> String {
        self.row_context_at(self.rows + 1)
    }

    fn row_context_at(&self, row: u64) -> String {
        format!("Unable to convert csv row {row} in file {}", self.path.display())
    }
}

impl Read for RowTranscoder {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending_pos >= self.pending.len() {
            let encoded = match self.pull() {
                Ok(Some(kind)) => self.encode_row(kind),
                Ok(None) => return Ok(0),
                Err(e) => Err(e),
            };
            match encoded {
                Ok(bytes) => {
                    self.pending = bytes;
                    self.pending_pos = 0;
                }
                Err(e) => {
                    let message = e.to_string();
                    self.error = Some(e);
                    return Err(io::Error::other(message));
                }
            }
        }

        let available = &self.pending[self.pending_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pending_pos += n;
        Ok(n)
    }
}
