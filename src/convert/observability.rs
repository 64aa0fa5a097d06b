//! Conversion observers.
//!
//! Every event is rendered as one line of `key=value` fields:
//!
//! ```text
//! event=ok direction=CsvToParquet input=a.csv output=a.parquet rows=3 cols=9
//! event=fail direction=CsvToParquet input=b.csv output=b.parquet severity=Error code=1 err=...
//! ```

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ConvertError;

use super::unified::{ConversionDirection, ConversionStats};

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConversionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (conversion refused or aborted).
    Error,
    /// Critical error (I/O or codec failures).
    Critical,
}

/// Context about a conversion attempt.
#[derive(Debug, Clone)]
pub struct ConversionContext {
    /// File being converted.
    pub input: PathBuf,
    /// File being written.
    pub output: PathBuf,
    /// Direction of the conversion.
    pub direction: ConversionDirection,
}

/// Observer interface for conversion outcomes.
pub trait ConversionObserver: Send + Sync {
    /// Called when a conversion succeeds (or is skipped because the output exists).
    fn on_success(&self, _ctx: &ConversionContext, _stats: ConversionStats) {}

    /// Called when a conversion fails.
    fn on_failure(&self, _ctx: &ConversionContext, _severity: ConversionSeverity, _error: &ConvertError) {}

    /// Called when a conversion failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        self.on_failure(ctx, severity, error)
    }
}

/// One observed outcome, formatted as `key=value` fields.
#[derive(Debug, Clone, Copy)]
pub enum ConversionEvent<'a> {
    /// A conversion finished or was skipped.
    Success(&'a ConversionContext, ConversionStats),
    /// A conversion failed.
    Failure(&'a ConversionContext, ConversionSeverity, &'a ConvertError),
    /// A failure at or above the alert threshold.
    Alert(&'a ConversionContext, ConversionSeverity, &'a ConvertError),
}

impl fmt::Display for ConversionEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (event, ctx) = match self {
            Self::Success(ctx, stats) => (if stats.skipped { "skip" } else { "ok" }, *ctx),
            Self::Failure(ctx, ..) => ("fail", *ctx),
            Self::Alert(ctx, ..) => ("alert", *ctx),
        };
        write!(
            f,
            "event={event} direction={:?} input={} output={}",
            ctx.direction,
            ctx.input.display(),
            ctx.output.display()
        )?;
        match self {
            Self::Success(_, stats) => write!(f, " rows={} cols={}", stats.rows, stats.columns),
            Self::Failure(_, severity, error) | Self::Alert(_, severity, error) => write!(
                f,
                " severity={severity:?} code={} err={error}",
                error.code()
            ),
        }
    }
}

/// Fans callbacks out to a list of observers, in order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ConversionObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn ConversionObserver>>) -> Self {
        Self { observers }
    }

    fn each(&self, f: impl Fn(&dyn ConversionObserver)) {
        self.observers.iter().for_each(|o| f(o.as_ref()));
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompositeObserver({} observers)", self.observers.len())
    }
}

impl ConversionObserver for CompositeObserver {
    fn on_success(&self, ctx: &ConversionContext, stats: ConversionStats) {
        self.each(|o| o.on_success(ctx, stats));
    }

    fn on_failure(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        self.each(|o| o.on_failure(ctx, severity, error));
    }

    fn on_alert(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        self.each(|o| o.on_alert(ctx, severity, error));
    }
}

/// Logs conversion events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl ConversionObserver for StdErrObserver {
    fn on_success(&self, ctx: &ConversionContext, stats: ConversionStats) {
        eprintln!("[csv2pq] {}", ConversionEvent::Success(ctx, stats));
    }

    fn on_failure(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        eprintln!("[csv2pq] {}", ConversionEvent::Failure(ctx, severity, error));
    }

    fn on_alert(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        eprintln!("[csv2pq][ALERT] {}", ConversionEvent::Alert(ctx, severity, error));
    }
}

/// Appends timestamped conversion events to a log file.
///
/// The file is opened on the first event and kept open. Logging is best-effort: open and write
/// failures are ignored.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(None),
        }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record(&self, event: ConversionEvent<'_>) {
        let Ok(mut slot) = self.file.lock() else {
            return;
        };
        if slot.is_none() {
            *slot = OpenOptions::new().create(true).append(true).open(&self.path).ok();
        }
        if let Some(file) = slot.as_mut() {
            let _ = writeln!(file, "ts={} {event}", unix_ts());
        }
    }
}

impl ConversionObserver for FileObserver {
    fn on_success(&self, ctx: &ConversionContext, stats: ConversionStats) {
        self.record(ConversionEvent::Success(ctx, stats));
    }

    fn on_failure(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        self.record(ConversionEvent::Failure(ctx, severity, error));
    }

    fn on_alert(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        self.record(ConversionEvent::Alert(ctx, severity, error));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
