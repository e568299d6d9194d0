//! # Log Destinations
//!
//! A [`Handler`] pairs an output sink with a formatter, a minimum severity and
//! any number of filters. Handlers are owned by the background listener and
//! are only ever written from that one thread.

use super::filter::RecordFilter;
use super::formatter::RecordFormatter;
use super::record::LogRecord;
use super::LoggingError;
use crate::settings::LogLevel;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// One output destination
pub struct Handler {
    name: String,
    min_severity: LogLevel,
    filters: Vec<Box<dyn RecordFilter>>,
    formatter: Box<dyn RecordFormatter>,
    sink: Box<dyn Write + Send>,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("min_severity", &self.min_severity)
            .field("filters", &self.filters.len())
            .finish_non_exhaustive()
    }
}

impl Handler {
    pub fn new(
        name: impl Into<String>,
        sink: Box<dyn Write + Send>,
        formatter: impl RecordFormatter + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            min_severity: LogLevel::Debug,
            filters: Vec::new(),
            formatter: Box::new(formatter),
            sink,
        }
    }

    pub fn stdout(formatter: impl RecordFormatter + 'static) -> Self {
        Self::new("stdout", Box::new(io::stdout()), formatter)
    }

    pub fn stderr(formatter: impl RecordFormatter + 'static) -> Self {
        Self::new("stderr", Box::new(io::stderr()), formatter)
    }

    /// Append to `path`, creating the file and its parent directories.
    ///
    /// The handler is named after the path and writes through a `BufWriter`.
    /// Existing content is never truncated, so restarts keep adding lines to
    /// the same JSON-lines file.
    ///
    /// ## Errors
    ///
    /// Returns [`LoggingError::OpenDestination`] when the directory cannot be
    /// created or the file cannot be opened for appending.
    pub fn file(path: &Path, formatter: impl RecordFormatter + 'static) -> Result<Self, LoggingError> {
        let open_error = |source| LoggingError::OpenDestination {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(open_error)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_error)?;

        Ok(Self::new(
            path.display().to_string(),
            Box::new(BufWriter::new(file)),
            formatter,
        ))
    }

    pub fn memory(buffer: MemoryBuffer, formatter: impl RecordFormatter + 'static) -> Self {
        Self::new("memory", Box::new(buffer), formatter)
    }

    pub fn with_min_severity(mut self, level: LogLevel) -> Self {
        self.min_severity = level;
        self
    }

    pub fn with_filter(mut self, filter: impl RecordFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn with_boxed_filter(mut self, filter: Box<dyn RecordFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_severity(&self) -> LogLevel {
        self.min_severity
    }

    /// Whether `record` passes this handler's gates.
    ///
    /// ## Evaluation Order
    ///
    /// 1. **Severity**: the record level must be at least `min_severity`
    /// 2. **Filters**: every attached filter must allow the record
    ///
    /// Filters are not consulted for records below the threshold.
    pub fn accepts(&self, record: &LogRecord) -> bool {
        record.level >= self.min_severity && self.filters.iter().all(|filter| filter.allows(record))
    }

    /// Write the record if accepted.
    ///
    /// Returns `Ok(true)` when a line was written and `Ok(false)` when the
    /// record was rejected by [`Handler::accepts`].
    ///
    /// ## Errors
    ///
    /// - Formatter failures surface as the formatter's [`LoggingError`]
    /// - Sink write failures surface as [`LoggingError::Io`]
    ///
    /// File sinks are buffered, so a line may only reach disk on
    /// [`Handler::flush`]. The listener flushes whenever the queue runs empty.
    pub fn handle(&mut self, record: &LogRecord) -> Result<bool, LoggingError> {
        if !self.accepts(record) {
            return Ok(false);
        }
        let line = self.formatter.format(record)?;
        writeln!(self.sink, "{line}")?;
        Ok(true)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// Shared in-memory sink, mostly for tests and diagnostics.
///
/// Clones share one buffer: hand one clone to [`Handler::memory`] and keep
/// another to read what the listener wrote.
///
/// ## Thread Safety
///
/// Writes and reads take the same mutex. A poisoned lock is recovered rather
/// than propagated so diagnostics stay readable after a panic elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryBuffer(Arc<Mutex<Vec<u8>>>);

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, decoded lossily as UTF-8
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for MemoryBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::filter::NonErrorFilter;
    use crate::logging::formatter::{JsonFormatter, SimpleFormatter};

    #[test]
    fn test_min_severity_and_filters_are_both_applied() {
        let buffer = MemoryBuffer::new();
        let mut handler = Handler::memory(buffer.clone(), SimpleFormatter)
            .with_min_severity(LogLevel::Info)
            .with_filter(NonErrorFilter);

        assert!(!handler.handle(&LogRecord::new("t", LogLevel::Debug, "too low")).unwrap());
        assert!(handler.handle(&LogRecord::new("t", LogLevel::Info, "kept")).unwrap());
        assert!(!handler.handle(&LogRecord::new("t", LogLevel::Error, "filtered")).unwrap());

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("kept"));
    }

    #[test]
    fn test_file_handler_appends_json_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("log_test.jsonl");

        for message in ["first", "second"] {
            let mut handler = Handler::file(&path, JsonFormatter::default()).unwrap();
            handler.handle(&LogRecord::new("t", LogLevel::Info, message)).unwrap();
            handler.flush().unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        let messages: Vec<String> = content
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap()["message"].to_string())
            .collect();
        assert_eq!(messages, vec!["\"first\"", "\"second\""]);
    }
}
