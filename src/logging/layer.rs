//! # tracing Bridge
//!
//! [`QueueLayer`] is a `tracing_subscriber` layer that turns every event it
//! sees into a [`LogRecord`] and enqueues it. It is the only output layer the
//! pipeline installs, so all delivery happens on the listener thread.
//!
//! ## Field Conventions
//!
//! - `message` becomes the record message
//! - a field recorded as an error (`error = &err as &dyn Error`) becomes
//!   exception info; further error fields are kept as text extras
//! - `stack_info = true` captures a backtrace at the call site
//! - `critical = true` raises an ERROR event to CRITICAL
//! - everything else becomes an extra, native JSON where possible and the
//!   `Debug` text otherwise

use super::queue::QueueSender;
use super::record::{ExceptionInfo, LogRecord};
use crate::settings::LogLevel;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Severity of a `tracing` level
pub fn severity_of(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warning,
        Level::INFO => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

pub struct QueueLayer {
    sender: QueueSender,
    root: LogLevel,
}

impl QueueLayer {
    /// Layer that forwards every event to `sender`
    pub fn new(sender: QueueSender) -> Self {
        Self {
            sender,
            root: LogLevel::Debug,
        }
    }

    /// Drop records below `root` once their final severity is known.
    ///
    /// The `EnvFilter` in front of this layer cannot tell ERROR from
    /// CRITICAL, so a CRITICAL root is only enforced here.
    pub fn with_root(mut self, root: LogLevel) -> Self {
        self.root = root;
        self
    }
}

impl<S> Layer<S> for QueueLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let mut level = severity_of(metadata.level());
        if visitor.critical && level == LogLevel::Error {
            level = LogLevel::Critical;
        }
        if level < self.root {
            return;
        }

        let mut record = LogRecord::new(metadata.target(), level, visitor.message);
        record.pathname = metadata.file().map(str::to_string);
        record.lineno = metadata.line();
        record.module = metadata.module_path().map(str::to_string);
        record.func_name = ctx.event_span(event).map(|span| span.name().to_string());
        record.exc_info = visitor.exc_info;
        record.extra = visitor.extra;
        if visitor.stack_info {
            record = record.capture_stack();
        }

        // A closed queue means logging is shutting down; the event is dropped
        let _ = self.sender.enqueue(record);
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    exc_info: Option<ExceptionInfo>,
    stack_info: bool,
    critical: bool,
    extra: Map<String, Value>,
}

impl RecordVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.extra.insert(field.name().to_string(), value);
    }
}

impl Visit for RecordVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        match field.name() {
            "stack_info" => self.stack_info = value,
            "critical" => self.critical = value,
            _ => self.insert(field, Value::from(value)),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON form
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(value.to_string()));
        self.insert(field, value);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.insert(field, Value::from(value));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.exc_info.is_none() {
            self.exc_info = Some(ExceptionInfo::from_error(value));
        } else {
            self.insert(field, Value::from(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.insert(field, Value::from(format!("{value:?}")));
        }
    }
}
