//! Log file setup
//!
//! Lines look like `2026-10-18 03:15:00.123 [4242] ERROR message`.

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Timestamp, process id, level and message on one line
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} [{}] {:<5} ",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            std::process::id(),
            event.metadata().level().as_str()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Initialize logging to `file` at `level`.
///
/// `RUST_LOG` takes precedence over `level`; an unusable `level` falls back
/// to `info`. If the log file cannot be opened, lines go to stderr instead.
pub fn init_logging(level: &str, file: &Path) {
    let (env_filter, level_error) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, None),
        Err(_) => level_filter(level),
    };

    let (writer, open_error) = match OpenOptions::new().create(true).append(true).open(file) {
        Ok(f) => (BoxMakeWriter::new(Mutex::new(f)), None),
        Err(e) => (BoxMakeWriter::new(std::io::stderr), Some(e)),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(writer)
        .event_format(LineFormat)
        .try_init();

    if let Some(e) = open_error {
        tracing::warn!("Cannot open log file {:?} ({}), logging to stderr", file, e);
    }
    if let Some(e) = level_error {
        tracing::warn!("Invalid log level {:?} ({}), using info", level, e);
    }
}

/// Filter for a configured level, or `info` if the level is unknown.
///
/// `EnvFilter` would accept a word like `verbose` as a target directive and
/// drop every event, so the level is parsed first.
fn level_filter(level: &str) -> (EnvFilter, Option<String>) {
    match level.parse::<Level>() {
        Ok(level) => (EnvFilter::new(level.as_str().to_lowercase()), None),
        Err(e) => (EnvFilter::new("info"), Some(e.to_string())),
    }
}
