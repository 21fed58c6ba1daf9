//! Diagnostic trace output.
//!
//! When `TESTSCOPE_CONFIGURATION_TRACE=true` is set, every `tracing` event the
//! crate emits is rendered on stdout as
//! `timestamp | thread | LEVEL | component | message`. The lines are meant for
//! humans only and nothing parses them.

use std::fmt;
use std::sync::OnceLock;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Environment variable that switches trace output on.
pub const TRACE_ENV: &str = "TESTSCOPE_CONFIGURATION_TRACE";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

static ENABLED: OnceLock<bool> = OnceLock::new();

/// Whether the trace flag is set. Read once per process.
pub fn is_enabled() -> bool {
    *ENABLED.get_or_init(|| std::env::var(TRACE_ENV).is_ok_and(|value| value.trim() == "true"))
}

/// Installs the trace subscriber if the trace flag is set.
pub fn init() {
    if is_enabled() {
        install();
    }
}

/// Installs the trace subscriber unconditionally.
///
/// Does nothing if a global subscriber is already in place.
pub fn install() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_writer(std::io::stdout)
        .event_format(TraceLineFormat)
        .try_init();
}

/// Renders one event as a pipe-separated trace line.
pub struct TraceLineFormat;

impl<S, N> FormatEvent<S, N> for TraceLineFormat
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
        let metadata = event.metadata();
        let thread = std::thread::current();
        write!(
            writer,
            "{} | {} | {} | {} | ",
            chrono::Local::now().format(TIMESTAMP_FORMAT),
            thread.name().unwrap_or("unnamed"),
            metadata.level(),
            metadata.target()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
