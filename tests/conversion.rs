use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use csv2pq::convert::convert_path;
use csv2pq::convert::parquet::verify_row_count;
use csv2pq::schema::SchemaSource;
use csv2pq::{Compression, Options};

fn tmp_file(name: &str, ext: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("csv2pq-convert-{name}-{nanos}.{ext}"))
}

fn objects_schema() -> SchemaSource {
    SchemaSource::from_arg("tests/fixtures/objects.schema")
}

fn read_parquet(path: &Path) -> RecordBatch {
    let file = File::open(path).unwrap();
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap();
    let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
    arrow::compute::concat_batches(&batches[0].schema(), &batches).unwrap()
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> &'a T {
    batch
        .column_by_name(name)
        .unwrap_or_else(|| panic!("missing column {name}"))
        .as_any()
        .downcast_ref::<T>()
        .unwrap_or_else(|| panic!("unexpected type for column {name}"))
}

#[test]
fn csv_to_parquet_writes_typed_columns_and_null_flags() {
    let out = tmp_file("objects", "parquet");
    let stats = convert_path("tests/fixtures/objects.csv", &out, &objects_schema(), &Options::default()).unwrap();
    assert_eq!(stats.rows, 3);
    assert_eq!(stats.columns, 9);
    assert!(!stats.skipped);

    let batch = read_parquet(&out);
    let schema = batch.schema();
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(
        names,
        vec!["objectId", "name", "mag", "nobs", "flags", "good", "ra", "nobs_ISNULL", "flags_ISNULL"]
    );
    assert_eq!(schema.field_with_name("name").unwrap().data_type(), &DataType::Utf8);
    assert_eq!(schema.field_with_name("nobs_ISNULL").unwrap().data_type(), &DataType::Boolean);

    let ids = column::<Int64Array>(&batch, "objectId");
    assert_eq!(ids.values().to_vec(), vec![1, 2, 3]);

    // Nullable float columns hold real nulls.
    let mag = column::<Float32Array>(&batch, "mag");
    assert!(mag.is_null(1));
    assert_eq!(mag.value(2), 14.75);

    // Nullable integer columns hold the replacement value plus a flag.
    let nobs = column::<Int32Array>(&batch, "nobs");
    assert_eq!(nobs.null_count(), 0);
    assert_eq!(nobs.values().to_vec(), vec![3, 0, 5]);
    let nobs_flag = column::<BooleanArray>(&batch, "nobs_ISNULL");
    assert_eq!(
        nobs_flag.iter().collect::<Vec<_>>(),
        vec![Some(false), Some(true), Some(false)]
    );

    let flags = column::<Int16Array>(&batch, "flags");
    assert_eq!(flags.values().to_vec(), vec![7, 0, 0]);
    let flags_flag = column::<BooleanArray>(&batch, "flags_ISNULL");
    assert_eq!(
        flags_flag.iter().collect::<Vec<_>>(),
        vec![Some(false), Some(true), Some(true)]
    );

    let ra = column::<Float64Array>(&batch, "ra");
    assert_eq!(ra.value(1), 11.25);

    let _ = std::fs::remove_file(out);
}

#[test]
fn replacement_value_is_configurable() {
    let out = tmp_file("nan", "parquet");
    let opts = Options {
        nan_replacement: "-1".to_string(),
        compression: Compression::Zstd,
        ..Default::default()
    };
    convert_path("tests/fixtures/objects.csv", &out, &objects_schema(), &opts).unwrap();

    let batch = read_parquet(&out);
    assert_eq!(column::<Int32Array>(&batch, "nobs").values().to_vec(), vec![3, -1, 5]);
    assert_eq!(column::<Int16Array>(&batch, "flags").values().to_vec(), vec![7, -1, -1]);

    let _ = std::fs::remove_file(out);
}

#[test]
fn parquet_to_csv_restores_null_sentinel() {
    let pq = tmp_file("roundtrip", "parquet");
    let csv = tmp_file("roundtrip", "csv");
    convert_path("tests/fixtures/objects.csv", &pq, &objects_schema(), &Options::default()).unwrap();

    let stats = convert_path(&pq, &csv, &objects_schema(), &Options::default()).unwrap();
    assert_eq!(stats.rows, 3);
    assert_eq!(stats.columns, 7);

    let text = std::fs::read_to_string(&csv).unwrap();
    let rows: Vec<Vec<&str>> = text.lines().map(|l| l.split(',').collect()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], vec!["2", "beta", "\\N", "\\N", "\\N", "false", "11.25"]);
    assert_eq!(rows[0][3], "3");
    assert_eq!(rows[0][4], "7");
    assert_eq!(rows[2][4], "\\N");

    let _ = std::fs::remove_file(pq);
    let _ = std::fs::remove_file(csv);
}

#[test]
fn existing_output_requires_replace_or_skip() {
    let out = tmp_file("exists", "parquet");
    std::fs::write(&out, b"placeholder").unwrap();

    let err = convert_path("tests/fixtures/objects.csv", &out, &objects_schema(), &Options::default()).unwrap_err();
    assert_eq!(err.code(), 1);
    assert!(err.to_string().contains("already exists"));

    let skip = Options {
        skip_existing: true,
        ..Default::default()
    };
    let stats = convert_path("tests/fixtures/objects.csv", &out, &objects_schema(), &skip).unwrap();
    assert!(stats.skipped);
    assert_eq!(std::fs::read(&out).unwrap(), b"placeholder");

    let replace = Options {
        replace: true,
        ..Default::default()
    };
    let stats = convert_path("tests/fixtures/objects.csv", &out, &objects_schema(), &replace).unwrap();
    assert_eq!(stats.rows, 3);

    let both = Options {
        replace: true,
        skip_existing: true,
        ..Default::default()
    };
    let err = convert_path("tests/fixtures/objects.csv", &out, &objects_schema(), &both).unwrap_err();
    assert_eq!(err.code(), 5);

    let _ = std::fs::remove_file(out);
}

#[test]
fn verify_checks_footer_row_count() {
    let out = tmp_file("verify", "parquet");
    let opts = Options {
        verify: true,
        compression: Compression::None,
        ..Default::default()
    };
    convert_path("tests/fixtures/objects.csv", &out, &objects_schema(), &opts).unwrap();

    verify_row_count(&out, 3).unwrap();
    let err = verify_row_count(&out, 4).unwrap_err();
    assert_eq!(err.code(), 1);

    let _ = std::fs::remove_file(out);
}

#[test]
fn header_mode_takes_names_and_infers_types() {
    let out = tmp_file("people", "parquet");
    let stats = convert_path(
        "tests/fixtures/people.csv",
        &out,
        &SchemaSource::Header,
        &Options::default(),
    )
    .unwrap();
    assert_eq!(stats.rows, 2);
    assert_eq!(stats.columns, 3);

    let batch = read_parquet(&out);
    assert_eq!(column::<Int64Array>(&batch, "id").values().to_vec(), vec![1, 2]);
    let score = column::<Float64Array>(&batch, "score");
    assert_eq!(score.value(0), 98.5);
    assert!(score.is_null(1));

    let _ = std::fs::remove_file(out);
}

#[test]
fn auto_type_infers_every_column() {
    let out = tmp_file("auto", "parquet");
    let opts = Options {
        auto_type: true,
        ..Default::default()
    };
    let stats = convert_path("tests/fixtures/objects.csv", &out, &objects_schema(), &opts).unwrap();
    assert_eq!(stats.columns, 7);

    let batch = read_parquet(&out);
    let nobs = column::<Int64Array>(&batch, "nobs");
    assert!(nobs.is_null(1));
    assert_eq!(nobs.value(2), 5);

    let _ = std::fs::remove_file(out);
}

#[test]
fn schema_mismatch_fails_before_output_is_created() {
    let schema_path = tmp_file("narrow", "schema");
    std::fs::write(&schema_path, "a bigint\nb char(8)\n").unwrap();
    let out = tmp_file("mismatch", "parquet");

    let err = convert_path(
        "tests/fixtures/objects.csv",
        &out,
        &SchemaSource::File(schema_path.clone()),
        &Options::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), 1);
    assert_eq!(err.to_string(), "Schema with 2 cols does not match the data with 7 cols.");
    assert!(!out.exists());

    let _ = std::fs::remove_file(schema_path);
}

#[test]
fn bad_integer_text_is_a_codec_error() {
    let input = tmp_file("badint", "csv");
    std::fs::write(&input, "1,x\nnope,y\n").unwrap();
    let schema_path = tmp_file("badint", "schema");
    std::fs::write(&schema_path, "a int\nb char(4)\n").unwrap();
    let out = tmp_file("badint", "parquet");

    let err = convert_path(&input, &out, &SchemaSource::File(schema_path.clone()), &Options::default()).unwrap_err();
    assert_eq!(err.code(), 0);
    assert!(err.to_string().starts_with("Unable to convert csv file"));

    let _ = std::fs::remove_file(input);
    let _ = std::fs::remove_file(schema_path);
    let _ = std::fs::remove_file(out);
}

fn write_schema(name: &str, text: &str) -> SchemaSource {
    let path = tmp_file(name, "schema");
    std::fs::write(&path, text).unwrap();
    SchemaSource::File(path)
}

fn strings(batch: &RecordBatch, name: &str) -> Vec<String> {
    column::<StringArray>(batch, name)
        .iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect()
}

#[test]
fn quotes_in_csv_data_are_kept_literally() {
    let input = tmp_file("quotes", "csv");
    std::fs::write(&input, "\"abc,1\nx\"y,\\N\n\"q\",2\n").unwrap();
    let schema = write_schema("quotes", "name char(20)\nv int NULL\n");
    let out = tmp_file("quotes", "parquet");
    let opts = Options {
        verify: true,
        ..Default::default()
    };

    let stats = convert_path(&input, &out, &schema, &opts).unwrap();
    assert_eq!(stats.rows, 3);

    let batch = read_parquet(&out);
    assert_eq!(strings(&batch, "name"), vec!["\"abc", "x\"y", "\"q\""]);
    assert_eq!(column::<Int32Array>(&batch, "v").values().to_vec(), vec![1, 0, 2]);
    assert_eq!(
        column::<BooleanArray>(&batch, "v_ISNULL").iter().collect::<Vec<_>>(),
        vec![Some(false), Some(true), Some(false)]
    );

    let _ = std::fs::remove_file(input);
    let _ = std::fs::remove_file(out);
}

#[test]
fn inferred_columns_keep_quotes_literally() {
    let input = tmp_file("quotes-auto", "csv");
    std::fs::write(&input, "\"abc,1\nx\"y,\\N\n\"q\",2\n").unwrap();
    let schema = write_schema("quotes-auto", "name\nv int NULL\n");
    let out = tmp_file("quotes-auto", "parquet");

    let stats = convert_path(&input, &out, &schema, &Options::default()).unwrap();
    assert_eq!(stats.rows, 3);
    assert_eq!(stats.columns, 3);

    let batch = read_parquet(&out);
    assert_eq!(strings(&batch, "name"), vec!["\"abc", "x\"y", "\"q\""]);

    let _ = std::fs::remove_file(input);
    let _ = std::fs::remove_file(out);
}

#[test]
fn parquet_to_csv_never_quotes_fields() {
    let pq = tmp_file("unquoted", "parquet");
    let schema = Arc::new(ArrowSchema::new(vec![
        Field::new("s", DataType::Utf8, true),
        Field::new("n", DataType::Int32, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(vec![Some("x\"y"), Some("\"q"), None])),
            Arc::new(Int32Array::from(vec![Some(1), None, Some(3)])),
        ],
    )
    .unwrap();
    let mut writer = ArrowWriter::try_new(File::create(&pq).unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let csv = tmp_file("unquoted", "csv");
    let stats = convert_path(&pq, &csv, &SchemaSource::Header, &Options::default()).unwrap();
    assert_eq!(stats.rows, 3);
    assert_eq!(std::fs::read_to_string(&csv).unwrap(), "x\"y,1\n\"q,\\N\n\\N,3\n");

    // Back to Parquet: the quoted text survives unchanged.
    let again = tmp_file("unquoted-again", "parquet");
    let schema = write_schema("unquoted", "s char(8)\nn int NULL\n");
    convert_path(&csv, &again, &schema, &Options::default()).unwrap();
    let batch = read_parquet(&again);
    assert_eq!(strings(&batch, "s"), vec!["x\"y", "\"q", ""]);
    assert!(column::<StringArray>(&batch, "s").is_null(2));
    assert_eq!(
        column::<BooleanArray>(&batch, "n_ISNULL").iter().collect::<Vec<_>>(),
        vec![Some(false), Some(true), Some(false)]
    );

    let _ = std::fs::remove_file(pq);
    let _ = std::fs::remove_file(csv);
    let _ = std::fs::remove_file(again);
}

#[test]
fn parquet_to_csv_writes_header_without_flag_columns() {
    let pq = tmp_file("header-out", "parquet");
    let csv = tmp_file("header-out", "csv");
    convert_path("tests/fixtures/objects.csv", &pq, &objects_schema(), &Options::default()).unwrap();

    let opts = Options {
        has_header: true,
        separator: '|',
        ..Default::default()
    };
    convert_path(&pq, &csv, &objects_schema(), &opts).unwrap();
    let text = std::fs::read_to_string(&csv).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("objectId|name|mag|nobs|flags|good|ra"));
    assert_eq!(lines.nth(1), Some("2|beta|\\N|\\N|\\N|false|11.25"));

    let _ = std::fs::remove_file(pq);
    let _ = std::fs::remove_file(csv);
}
