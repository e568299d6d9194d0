//! # Record Formatters
//!
//! [`JsonFormatter`] projects a [`LogRecord`] onto one single-line JSON object:
//!
//! 1. `message` and `timestamp` (UTC, ISO-8601 with offset) are always computed
//! 2. `exc_info` / `stack_info` are added only when the record carries them
//! 3. the field mapping (output key -> record attribute) is applied; mapped
//!    computed fields are consumed so they are not written twice
//! 4. computed fields the mapping did not consume are merged in
//! 5. caller-supplied extras are merged last
//!
//! Attribute names in the mapping are resolved to [`RecordField`] accessors
//! when the formatter is built. An unknown builtin name fails there, and an
//! `extra.<key>` reference that a record does not carry fails when formatting.

use super::record::LogRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Attribute names that never surface as extras
pub const RESERVED_ATTRIBUTES: &[&str] = &[
    "args",
    "asctime",
    "created",
    "exc_info",
    "exc_text",
    "filename",
    "funcName",
    "levelname",
    "levelno",
    "lineno",
    "message",
    "module",
    "msecs",
    "msg",
    "name",
    "pathname",
    "process",
    "processName",
    "relativeCreated",
    "stack_info",
    "taskName",
    "thread",
    "threadName",
];

/// Output mapping used when none is configured
pub const DEFAULT_FIELD_MAPPING: &[(&str, &str)] = &[
    ("level", "levelname"),
    ("message", "message"),
    ("timestamp", "timestamp"),
    ("logger", "name"),
    ("module", "module"),
    ("function", "funcName"),
    ("line", "lineno"),
    ("thread_name", "threadName"),
];

#[derive(Debug, thiserror::Error)]
pub enum FormatterError {
    #[error("field {key:?} maps to unknown record attribute {attribute:?}")]
    UnknownAttribute { key: String, attribute: String },

    #[error("record has no attribute {0:?}")]
    MissingAttribute(String),

    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Typed accessor over one [`LogRecord`] attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordField {
    Message,
    Timestamp,
    ExcInfo,
    StackInfo,
    LevelName,
    LevelNo,
    Name,
    PathName,
    FileName,
    Module,
    FuncName,
    LineNo,
    Created,
    Thread,
    ThreadName,
    Process,
    /// Caller-supplied attribute, written `extra.<key>` in a mapping
    Extra(String),
}

impl FromStr for RecordField {
    type Err = String;

    fn from_str(attribute: &str) -> Result<Self, Self::Err> {
        let field = match attribute {
            "message" => Self::Message,
            "timestamp" => Self::Timestamp,
            "exc_info" => Self::ExcInfo,
            "stack_info" => Self::StackInfo,
            "levelname" => Self::LevelName,
            "levelno" => Self::LevelNo,
            "name" => Self::Name,
            "pathname" => Self::PathName,
            "filename" => Self::FileName,
            "module" => Self::Module,
            "funcName" | "func_name" => Self::FuncName,
            "lineno" => Self::LineNo,
            "created" => Self::Created,
            "thread" => Self::Thread,
            "threadName" | "thread_name" => Self::ThreadName,
            "process" => Self::Process,
            other => match other.strip_prefix("extra.") {
                Some(key) if !key.is_empty() => Self::Extra(key.to_string()),
                _ => return Err(other.to_string()),
            },
        };
        Ok(field)
    }
}

impl RecordField {
    /// Key of the always-computed value this field reads, if any
    fn computed_key(&self) -> Option<&'static str> {
        match self {
            Self::Message => Some("message"),
            Self::Timestamp => Some("timestamp"),
            Self::ExcInfo => Some("exc_info"),
            Self::StackInfo => Some("stack_info"),
            _ => None,
        }
    }

    fn read(&self, record: &LogRecord) -> Result<Value, FormatterError> {
        let value = match self {
            Self::Message => Value::from(record.message.as_str()),
            Self::Timestamp => Value::from(iso_timestamp(&record.created)),
            Self::ExcInfo => record.exc_info.as_ref().map(|exc| exc.to_string()).into(),
            Self::StackInfo => record.stack_info.clone().into(),
            Self::LevelName => Value::from(record.level.as_str()),
            Self::LevelNo => Value::from(record.level.numeric()),
            Self::Name => Value::from(record.name.as_str()),
            Self::PathName => record.pathname.clone().into(),
            Self::FileName => record.filename().into(),
            Self::Module => record.module.clone().into(),
            Self::FuncName => record.func_name.clone().into(),
            Self::LineNo => record.lineno.into(),
            Self::Created => Value::from(epoch_seconds(&record.created)),
            Self::Thread => Value::from(record.thread_id.as_str()),
            Self::ThreadName => Value::from(record.thread_name.as_str()),
            Self::Process => Value::from(record.process),
            Self::Extra(key) => record
                .extra
                .get(key)
                .cloned()
                .ok_or_else(|| FormatterError::MissingAttribute(format!("extra.{key}")))?,
        };
        Ok(value)
    }
}

/// ISO-8601 in UTC, `2023-01-01T12:00:00+00:00`, with microseconds only
/// when non-zero.
pub fn iso_timestamp(instant: &DateTime<Utc>) -> String {
    let precision = if instant.timestamp_subsec_micros() == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    instant.to_rfc3339_opts(precision, false)
}

fn epoch_seconds(instant: &DateTime<Utc>) -> f64 {
    instant.timestamp() as f64 + f64::from(instant.timestamp_subsec_micros()) / 1_000_000.0
}

/// Turns a record into one line of output, without the trailing newline
pub trait RecordFormatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> Result<String, FormatterError>;
}

impl RecordFormatter for Box<dyn RecordFormatter> {
    fn format(&self, record: &LogRecord) -> Result<String, FormatterError> {
        (**self).format(record)
    }
}

/// JSON-lines formatter with a configurable output mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonFormatter {
    fields: Vec<(String, RecordField)>,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        let fields = DEFAULT_FIELD_MAPPING
            .iter()
            .filter_map(|(key, attribute)| Some((key.to_string(), attribute.parse::<RecordField>().ok()?)))
            .collect();
        Self { fields }
    }
}

impl JsonFormatter {
    /// Build from `(output key, attribute name)` pairs.
    pub fn new<K, A>(mapping: impl IntoIterator<Item = (K, A)>) -> Result<Self, FormatterError>
    where
        K: Into<String>,
        A: AsRef<str>,
    {
        let fields = mapping
            .into_iter()
            .map(|(key, attribute)| {
                let key: String = key.into();
                let attribute = attribute.as_ref();
                attribute
                    .parse::<RecordField>()
                    .map(|field| (key.clone(), field))
                    .map_err(|attribute| FormatterError::UnknownAttribute { key, attribute })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { fields })
    }

    /// Formatter without any mapping: computed fields and extras only
    pub fn bare() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn from_keys(mapping: &BTreeMap<String, String>) -> Result<Self, FormatterError> {
        Self::new(mapping.iter().map(|(key, attribute)| (key.clone(), attribute)))
    }

    /// Build the JSON object for a record.
    pub fn to_object(&self, record: &LogRecord) -> Result<Map<String, Value>, FormatterError> {
        let mut computed = Map::new();
        computed.insert("message".into(), Value::from(record.message.as_str()));
        computed.insert("timestamp".into(), Value::from(iso_timestamp(&record.created)));
        if let Some(exc_info) = &record.exc_info {
            computed.insert("exc_info".into(), Value::from(exc_info.to_string()));
        }
        if let Some(stack_info) = &record.stack_info {
            computed.insert("stack_info".into(), Value::from(stack_info.as_str()));
        }

        let mut object = Map::new();
        for (key, field) in &self.fields {
            let value = match field.computed_key().and_then(|name| computed.remove(name)) {
                Some(value) => value,
                None => field.read(record)?,
            };
            object.insert(key.clone(), value);
        }

        object.extend(computed);

        for (key, value) in &record.extra {
            if !RESERVED_ATTRIBUTES.contains(&key.as_str()) {
                object.insert(key.clone(), value.clone());
            }
        }

        Ok(object)
    }
}

impl RecordFormatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> Result<String, FormatterError> {
        let object = self.to_object(record)?;
        Ok(serde_json::to_string(&Value::Object(object))?)
    }
}

/// Human-oriented single line: `<timestamp> <LEVEL> [<logger>] <message>`
///
/// Exception and stack text, when present, follow on the next lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimpleFormatter;

impl RecordFormatter for SimpleFormatter {
    fn format(&self, record: &LogRecord) -> Result<String, FormatterError> {
        let mut line = format!(
            "{} {:<8} [{}] {}",
            record.created.format("%Y-%m-%dT%H:%M:%S%.3f%:z"),
            record.level.as_str(),
            record.name,
            record.message
        );
        if let Some(exc_info) = &record.exc_info {
            line.push('\n');
            line.push_str(&exc_info.to_string());
        }
        if let Some(stack_info) = &record.stack_info {
            line.push('\n');
            line.push_str(stack_info);
        }
        Ok(line)
    }
}
