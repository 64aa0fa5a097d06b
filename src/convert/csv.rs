//! Parquet → CSV conversion.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray};
use arrow::compute::nullif;
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::{ConvertError, ConvertResult};
use crate::options::Options;
use crate::types::ISNULL_SUFFIX;

use super::unified::{prepare_output, ConversionStats};

/// Convert a Parquet file into delimited text.
///
/// Every `<X>_ISNULL` boolean column whose base column `X` is present is folded back: rows with
/// a `true` flag write the null sentinel for `X`, and the flag column itself is not written.
/// Fields are written verbatim, without quoting, matching the text the forward direction reads.
pub fn parquet_to_csv(input: &Path, output: &Path, options: &Options) -> ConvertResult<ConversionStats> {
    options.validate()?;

    if prepare_output(output, options)? {
        return Ok(ConversionStats::skipped());
    }

    let read_context = || format!("Unable to read parquet file {}", input.display());
    let file = File::open(input).map_err(|e| ConvertError::io(read_context(), e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| ConvertError::parquet(read_context(), e))?
        .with_batch_size(options.batch_size)
        .build()
        .map_err(|e| ConvertError::parquet(read_context(), e))?;

    let write_context = || format!("Unable to write csv file {}", output.display());
    let out = File::create(output).map_err(|e| ConvertError::io(write_context(), e))?;
    let mut writer = ::csv::WriterBuilder::new()
        .delimiter(options.separator_byte())
        .quote_style(::csv::QuoteStyle::Never)
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(BufWriter::new(out));

    let layout = restore_nulls(&RecordBatch::new_empty(reader.schema()))
        .map_err(|e| ConvertError::arrow(read_context(), e))?;
    if options.has_header {
        let names = layout.schema().fields().iter().map(|f| f.name().clone()).collect::<Vec<_>>();
        writer
            .write_record(&names)
            .map_err(|e| ConvertError::csv(write_context(), e))?;
    }

    let format = FormatOptions::default().with_null(&options.null_sentinel);
    let mut record: Vec<String> = Vec::with_capacity(layout.num_columns());
    let mut rows = 0usize;
    for batch in reader {
        let batch = batch.map_err(|e| ConvertError::arrow(read_context(), e))?;
        let batch = restore_nulls(&batch).map_err(|e| ConvertError::arrow(read_context(), e))?;
        let formatters = batch
            .columns()
            .iter()
            .map(|c| ArrayFormatter::try_new(c.as_ref(), &format))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConvertError::arrow(write_context(), e))?;

        for row in 0..batch.num_rows() {
            record.clear();
            for f in &formatters {
                let text = f
                    .value(row)
                    .try_to_string()
                    .map_err(|e| ConvertError::arrow(write_context(), e))?;
                record.push(text);
            }
            writer
                .write_record(&record)
                .map_err(|e| ConvertError::csv(write_context(), e))?;
        }
        rows += batch.num_rows();
    }

    writer
        .flush()
        .map_err(|e| ConvertError::io(write_context(), e))?;

    Ok(ConversionStats {
        rows,
        columns: layout.num_columns(),
        skipped: false,
    })
}

/// Fold `<X>_ISNULL` flag columns back into nulls of `X` and drop them.
pub fn restore_nulls(batch: &RecordBatch) -> Result<RecordBatch, arrow::error::ArrowError> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for (i, field) in schema.fields().iter().enumerate() {
        if is_flag_column(&schema, field) {
            continue;
        }

        let column = batch.column(i);
        let flags = schema
            .index_of(&format!("{}{ISNULL_SUFFIX}", field.name()))
            .ok()
            .and_then(|j| batch.column(j).as_any().downcast_ref::<BooleanArray>());

        match flags {
            Some(flags) => {
                columns.push(nullif(column.as_ref(), flags)?);
                fields.push(field.as_ref().clone().with_nullable(true));
            }
            None => {
                columns.push(Arc::clone(column));
                fields.push(field.as_ref().clone());
            }
        }
    }

    RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), columns)
}

fn is_flag_column(schema: &ArrowSchema, field: &Field) -> bool {
    field.data_type() == &DataType::Boolean
        && field
            .name()
            .strip_suffix(ISNULL_SUFFIX)
            .is_some_and(|base| schema.index_of(base).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, StringArray};

    #[test]
    fn restore_nulls_folds_flags_and_keeps_other_columns() {
        let schema = Arc::new(ArrowSchema::new(vec![
            Field::new("id", DataType::Int32, true),
            Field::new("name", DataType::Utf8, true),
            Field::new("id_ISNULL", DataType::Boolean, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![1, 0, 3])),
                Arc::new(StringArray::from(vec!["a", "b", "c"])),
                Arc::new(BooleanArray::from(vec![false, true, false])),
            ],
        )
        .unwrap();

        let restored = restore_nulls(&batch).unwrap();
        assert_eq!(restored.num_columns(), 2);
        assert_eq!(restored.schema().field(0).name(), "id");
        let ids = restored.column(0).as_any().downcast_ref::<Int32Array>().unwrap();
        assert!(ids.is_valid(0));
        assert!(ids.is_null(1));
        assert_eq!(ids.value(2), 3);
    }

    #[test]
    fn orphan_flag_columns_are_kept() {
        let schema = Arc::new(ArrowSchema::new(vec![Field::new(
            "gone_ISNULL",
            DataType::Boolean,
            false,
        )]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(BooleanArray::from(vec![true]))]).unwrap();
        assert_eq!(restore_nulls(&batch).unwrap().num_columns(), 1);
    }
}
