//! Log output for the probe.
//!
//! Two concerns live here:
//!
//! - [`ProbeLogger`], the three-level log capability handed to the probe
//!   core. Production code uses [`TracingLogger`]; tests use
//!   [`MemoryLogger`] to assert on what was said.
//! - [`init`], which installs the process-wide `tracing` subscriber.
//!   Only `main` calls it.
//!
//! Text format (default):
//! ```text
//! 2024-12-28T15:04:05.123456Z [I] - connected to ActiveMQ: 127.0.0.1:61613
//! ```
//!
//! JSON format (`LOG_FORMAT=json`):
//! ```json
//! {"ts":"2024-12-28T15:04:05.123456Z","level":"info","msg":"connected","data":{}}
//! ```

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Mutex;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Three-level log sink used by the probe core.
pub trait ProbeLogger: Send + Sync {
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

/// Forwards to the `tracing` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl ProbeLogger for TracingLogger {
    fn info(&self, msg: &str) {
        tracing::info!("{}", msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!("{}", msg);
    }
}

/// Severity of a captured line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<(Severity, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, severity: Severity, msg: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((severity, msg.to_string()));
        }
    }

    /// Snapshot of all captured lines.
    pub fn lines(&self) -> Vec<(Severity, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Captured messages of one severity.
    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m)
            .collect()
    }

    /// True if any line of `severity` contains `needle`.
    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.messages(severity).iter().any(|m| m.contains(needle))
    }
}

impl ProbeLogger for MemoryLogger {
    fn info(&self, msg: &str) {
        self.push(Severity::Info, msg);
    }

    fn warn(&self, msg: &str) {
        self.push(Severity::Warn, msg);
    }

    fn error(&self, msg: &str) {
        self.push(Severity::Error, msg);
    }
}

/// Install the global subscriber.
///
/// INFO and below go to stdout, WARN and ERROR to stderr.
pub fn init(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("stomp_probe=info"));
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);

    let layer = tracing_subscriber::fmt::layer().with_writer(writer);

    // try_init: a second call (tests) must not panic
    let _ = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(layer.event_format(TextFormatter))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.event_format(JsonFormatter))
            .try_init(),
    };
}

/// Short severity tag used in the text format.
fn level_tag(level: &Level) -> &'static str {
    match *level {
        Level::TRACE | Level::DEBUG => "[D]",
        Level::INFO => "[I]",
        Level::WARN => "[W]",
        Level::ERROR => "[E]",
    }
}

/// `<ts> [I] - <message> key=value ...`
pub struct TextFormatter;

impl<S, N> FormatEvent<S, N> for TextFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);

        SystemTime.format_time(&mut writer)?;
        write!(
            writer,
            " {} - {}",
            level_tag(event.metadata().level()),
            visitor.message.unwrap_or_default()
        )?;

        let mut fields: Vec<_> = visitor.fields.into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in fields {
            match value {
                serde_json::Value::String(s) => write!(writer, " {}={}", key, s)?,
                other => write!(writer, " {}={}", key, other)?,
            }
        }

        writeln!(writer)
    }
}

/// One JSON object per event.
pub struct JsonFormatter;

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let level = match *event.metadata().level() {
            Level::TRACE | Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };

        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);

        let mut ts = String::new();
        SystemTime.format_time(&mut Writer::new(&mut ts))?;

        let entry = serde_json::json!({
            "ts": ts,
            "level": level,
            "msg": visitor.message.unwrap_or_default(),
            "data": visitor.fields,
        });

        writeln!(
            writer,
            "{}",
            serde_json::to_string(&entry).unwrap_or_default()
        )
    }
}

/// Field visitor for collecting tracing fields.
struct FieldVisitor {
    message: Option<String>,
    fields: HashMap<String, serde_json::Value>,
}

impl FieldVisitor {
    fn new() -> Self {
        Self {
            message: None,
            fields: HashMap::new(),
        }
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let mut rendered = String::new();
        let _ = write!(rendered, "{:?}", value);
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(rendered),
            );
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }
}
