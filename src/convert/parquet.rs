//! CSV → Parquet conversion.

use std::fs::File;
use std::path::Path;

use arrow::csv::reader::Format;
use arrow::datatypes::Schema as ArrowSchema;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use regex::Regex;

use crate::error::{ConvertError, ConvertResult};
use crate::options::Options;
use crate::schema::{check_consistency, header_schema, parse_schema, SchemaSource};
use crate::transcode::RowTranscoder;
use crate::types::Schema;

// Quote byte of the transcoded byte stream. Only fields that held a literal `"` are quoted.
const TRANSCODED_QUOTE: u8 = b'"';

use super::unified::{prepare_output, ConversionStats};

/// Convert a CSV file into a Parquet file.
///
/// Steps:
///
/// - parse the schema (or take column names from the header row in header mode)
/// - check the first data row against the schema's column count
/// - infer types for untyped columns from the transcoded rows, if any
/// - stream transcoded rows through the Arrow CSV reader into the Parquet writer
/// - with `options.verify`, re-read the Parquet footer and compare row counts
pub fn csv_to_parquet(
    input: &Path,
    output: &Path,
    source: &SchemaSource,
    options: &Options,
) -> ConvertResult<ConversionStats> {
    options.validate()?;

    let mut schema = parse_schema(source, options)?;
    if schema.from_header {
        schema = header_schema(input, options)?;
    } else {
        check_consistency(input, &schema, options)?;
    }

    if prepare_output(output, options)? {
        return Ok(ConversionStats::skipped());
    }

    let has_header = options.has_header || schema.from_header;
    let null_regex = null_regex(options)?;
    let inferred = if schema.needs_inference() {
        Some(infer_csv_schema(input, &schema, has_header, &null_regex, options)?)
    } else {
        None
    };
    let arrow_schema = schema.arrow_schema(inferred.as_ref())?;

    let mut transcoder = RowTranscoder::open(input, &schema, options)?;
    let read_context = || format!("Unable to convert csv file {}", input.display());

    let mut builder = arrow::csv::ReaderBuilder::new(arrow_schema.clone())
        .with_header(has_header)
        .with_delimiter(options.separator_byte())
        .with_batch_size(options.batch_size)
        .with_quote(TRANSCODED_QUOTE)
        .with_null_regex(null_regex);
    if let Some(c) = options.comment_byte() {
        builder = builder.with_comment(c);
    }
    let reader = builder
        .build(&mut transcoder)
        .map_err(|e| ConvertError::arrow(read_context(), e))?;

    let write_context = || format!("Unable to write parquet file {}", output.display());
    let file = File::create(output).map_err(|e| ConvertError::io(write_context(), e))?;
    let props = WriterProperties::builder()
        .set_compression(options.compression.to_parquet())
        .build();
    let mut writer = ArrowWriter::try_new(file, arrow_schema.clone(), Some(props))
        .map_err(|e| ConvertError::parquet(write_context(), e))?;

    let mut rows = 0usize;
    let mut failure = None;
    for batch in reader {
        match batch {
            Ok(batch) => {
                rows += batch.num_rows();
                writer
                    .write(&batch)
                    .map_err(|e| ConvertError::parquet(write_context(), e))?;
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    if let Some(e) = failure {
        // Prefer the transcoder's own error: it carries the row number and taxonomy code.
        return Err(transcoder
            .take_error()
            .unwrap_or_else(|| ConvertError::arrow(read_context(), e)));
    }

    writer
        .close()
        .map_err(|e| ConvertError::parquet(write_context(), e))?;

    if options.verify {
        verify_row_count(output, rows)?;
    }

    Ok(ConversionStats {
        rows,
        columns: arrow_schema.fields().len(),
        skipped: false,
    })
}

/// Regex matching the text the codec reads as null: the empty string or the null sentinel.
pub(crate) fn null_regex(options: &Options) -> ConvertResult<Regex> {
    Regex::new(&format!("^(?:{})?$", regex::escape(&options.null_sentinel)))
        .map_err(|_| ConvertError::invalid("null value", options.null_sentinel.as_str()))
}

// Types are inferred from the transcoded stream, so quotes in the data stay literal and flag
// columns are seen exactly as the reader will see them.
fn infer_csv_schema(
    input: &Path,
    schema: &Schema,
    has_header: bool,
    null_regex: &Regex,
    options: &Options,
) -> ConvertResult<ArrowSchema> {
    let context = || format!("Unable to infer column types of {}", input.display());
    let mut transcoder = RowTranscoder::open(input, schema, options)?;

    let mut format = Format::default()
        .with_header(has_header)
        .with_delimiter(options.separator_byte())
        .with_quote(TRANSCODED_QUOTE)
        .with_null_regex(null_regex.clone());
    if let Some(c) = options.comment_byte() {
        format = format.with_comment(c);
    }
    match format.infer_schema(&mut transcoder, None) {
        Ok((inferred, _)) => Ok(inferred),
        Err(e) => Err(transcoder
            .take_error()
            .unwrap_or_else(|| ConvertError::arrow(context(), e))),
    }
}

/// Re-open a written Parquet file and check the row count recorded in its footer.
pub fn verify_row_count(output: &Path, expected: usize) -> ConvertResult<()> {
    let context = || format!("Unable to verify parquet file {}", output.display());
    let file = File::open(output).map_err(|e| ConvertError::io(context(), e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| ConvertError::parquet(context(), e))?;

    let found = builder.metadata().file_metadata().num_rows();
    if usize::try_from(found).ok() != Some(expected) {
        return Err(ConvertError::Inconsistent(format!(
            "Parquet file {} has {found} rows but {expected} were written",
            output.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_regex_matches_empty_and_sentinel_only() {
        let re = null_regex(&Options::default()).unwrap();
        assert!(re.is_match(""));
        assert!(re.is_match("\\N"));
        assert!(!re.is_match("N"));
        assert!(!re.is_match("x\\N"));

        let opts = Options {
            null_sentinel: "NA".to_string(),
            ..Default::default()
        };
        let re = null_regex(&opts).unwrap();
        assert!(re.is_match("NA"));
        assert!(!re.is_match("NAN"));
    }
}
