//! csv2pq command line front end.
//!
//! Usage:
//!   csv2pq --schema objects.schema objects.csv objects.parquet
//!   csv2pq --schema hdr --replace night1.csv night2.csv out/
//!   csv2pq objects.parquet objects.csv

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use csv2pq::convert::{
    default_output_path, CompositeObserver, ConversionFormat, ConversionObserver, ConversionRequest,
    FileObserver, StdErrObserver,
};
use csv2pq::error::fatal;
use csv2pq::schema::{SchemaSource, HEADER_SCHEMA};
use csv2pq::{Compression, ConvertError, ConvertResult, Options};

#[derive(Parser, Debug)]
#[command(name = "csv2pq")]
#[command(about = "Convert CSV files to Parquet (and back) using a column schema")]
#[command(version)]
struct Args {
    /// Input files followed by the output file (or an existing directory for several inputs)
    #[arg(required = true, num_args = 2..)]
    paths: Vec<PathBuf>,

    /// Schema file, or `hdr` to take column names from the data's header row
    #[arg(short, long)]
    schema: Option<String>,

    /// JSON file with default options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Option override as key[=value] (cmt, nil, nan, sep, hdr, ato, dsp, cmp, bsz, rep, skp, vfy)
    #[arg(long = "set", value_name = "KEY[=VALUE]")]
    sets: Vec<String>,

    /// Field separator
    #[arg(long)]
    sep: Option<String>,

    /// Comment character
    #[arg(long)]
    comment: Option<String>,

    /// Text that denotes a null value
    #[arg(long)]
    null: Option<String>,

    /// Value written in place of null integers
    #[arg(long)]
    nan: Option<String>,

    /// The data's first row holds column names
    #[arg(long)]
    header: bool,

    /// Ignore schema types and infer them from the data
    #[arg(long)]
    auto_type: bool,

    /// Print the parsed schema
    #[arg(long)]
    display_schema: bool,

    /// Parquet compression (none, snappy, zstd)
    #[arg(long)]
    compression: Option<String>,

    /// Rows per record batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Overwrite existing output files
    #[arg(long)]
    replace: bool,

    /// Skip inputs whose output already exists
    #[arg(long)]
    skip: bool,

    /// Check the row count of written Parquet files
    #[arg(long)]
    verify: bool,

    /// Log each conversion to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Append conversion events to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        fatal(&e);
    }
}

fn run(args: Args) -> ConvertResult<()> {
    let options = build_options(&args)?;
    options.validate()?;

    let schema = SchemaSource::from_arg(args.schema.as_deref().unwrap_or(HEADER_SCHEMA));
    for request in build_requests(&args, &schema, &options)? {
        request.run()?;
    }
    Ok(())
}

fn build_options(args: &Args) -> ConvertResult<Options> {
    let mut options = match &args.config {
        Some(path) => Options::from_json_path(path)?,
        None => Options::default(),
    };

    for assignment in &args.sets {
        options.set_assignment(assignment)?;
    }
    if let Some(sep) = &args.sep {
        options.set("sep", Some(sep.as_str()))?;
    }
    if let Some(comment) = &args.comment {
        options.set("cmt", Some(comment.as_str()))?;
    }
    if let Some(null) = &args.null {
        options.null_sentinel = null.clone();
    }
    if let Some(nan) = &args.nan {
        options.nan_replacement = nan.clone();
    }
    if let Some(compression) = &args.compression {
        options.compression = compression.parse::<Compression>()?;
    }
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size;
    }
    options.has_header |= args.header;
    options.auto_type |= args.auto_type;
    options.display_schema |= args.display_schema;
    options.replace |= args.replace;
    options.skip_existing |= args.skip;
    options.verify |= args.verify;

    let mut observers: Vec<Arc<dyn ConversionObserver>> = Vec::new();
    if args.verbose {
        observers.push(Arc::new(StdErrObserver));
    }
    if let Some(path) = &args.log_file {
        observers.push(Arc::new(FileObserver::new(path)));
    }
    if !observers.is_empty() {
        options.observer = Some(Arc::new(CompositeObserver::new(observers)));
    }

    Ok(options)
}

fn build_requests(
    args: &Args,
    schema: &SchemaSource,
    options: &Options,
) -> ConvertResult<Vec<ConversionRequest>> {
    let Some((output, inputs)) = args.paths.split_last() else {
        return Err(ConvertError::MissingValue("Output file".to_string()));
    };
    if inputs.is_empty() {
        return Err(ConvertError::MissingValue("Input file".to_string()));
    }

    let into_dir = output.is_dir();
    if inputs.len() > 1 && !into_dir {
        return Err(ConvertError::invalid(
            "output directory",
            output.display().to_string(),
        ));
    }

    let mut requests = Vec::with_capacity(inputs.len());
    for input in inputs {
        let target = if into_dir {
            let format = match ConversionFormat::from_path(input)? {
                ConversionFormat::Parquet => ConversionFormat::Csv,
                ConversionFormat::Csv => ConversionFormat::Parquet,
            };
            default_output_path(input, output, format)
        } else {
            output.clone()
        };
        requests.push(ConversionRequest {
            input: input.clone(),
            output: target,
            schema: schema.clone(),
            options: options.clone(),
        });
    }
    Ok(requests)
}
