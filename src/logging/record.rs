//! # Log Records
//!
//! A [`LogRecord`] is one discrete log event: builtin attributes captured at
//! the call site plus arbitrary caller-supplied extras. Records are created on
//! the emitting thread, moved through the queue and dropped after delivery.

use crate::settings::LogLevel;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;
use std::path::Path;
use std::thread;

/// Exception details attached to a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Concrete error type, when known at capture time
    pub kind: Option<String>,
    pub message: String,
    /// `source()` chain, outermost first
    pub causes: Vec<String>,
}

impl ExceptionInfo {
    /// Capture an error and its source chain.
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            kind: None,
            message: err.to_string(),
            causes,
        }
    }

    /// Like [`ExceptionInfo::from_error`], also recording the error's type name.
    pub fn capture<E: Error + 'static>(err: &E) -> Self {
        Self {
            kind: Some(std::any::type_name::<E>().to_string()),
            ..Self::from_error(err)
        }
    }
}

impl fmt::Display for ExceptionInfo {
    /// Multi-line trace: headline, then one indented line per cause
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{kind}: {}", self.message)?,
            None => f.write_str(&self.message)?,
        }
        if !self.causes.is_empty() {
            f.write_str("\n\nCaused by:")?;
            for (index, cause) in self.causes.iter().enumerate() {
                write!(f, "\n    {index}: {cause}")?;
            }
        }
        Ok(())
    }
}

/// One log event
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Logger name (the `tracing` target for bridged events)
    pub name: String,
    pub level: LogLevel,
    /// Fully interpolated message text
    pub message: String,
    /// Creation instant
    pub created: DateTime<Utc>,
    /// Source file path
    pub pathname: Option<String>,
    pub module: Option<String>,
    pub func_name: Option<String>,
    pub lineno: Option<u32>,
    pub thread_id: String,
    pub thread_name: String,
    pub process: u32,
    pub exc_info: Option<ExceptionInfo>,
    pub stack_info: Option<String>,
    /// Caller-supplied attributes
    pub extra: Map<String, Value>,
}

impl LogRecord {
    /// Record created now, on the current thread.
    pub fn new(name: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        let current = thread::current();
        Self {
            name: name.into(),
            level,
            message: message.into(),
            created: Utc::now(),
            pathname: None,
            module: None,
            func_name: None,
            lineno: None,
            thread_id: format!("{:?}", current.id()),
            thread_name: current.name().unwrap_or("unnamed").to_string(),
            process: std::process::id(),
            exc_info: None,
            stack_info: None,
            extra: Map::new(),
        }
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    pub fn with_location(mut self, pathname: impl Into<String>, lineno: u32) -> Self {
        self.pathname = Some(pathname.into());
        self.lineno = Some(lineno);
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_function(mut self, func_name: impl Into<String>) -> Self {
        self.func_name = Some(func_name.into());
        self
    }

    pub fn with_exception(mut self, exc_info: ExceptionInfo) -> Self {
        self.exc_info = Some(exc_info);
        self
    }

    pub fn with_stack_info(mut self, stack_info: impl Into<String>) -> Self {
        self.stack_info = Some(stack_info.into());
        self
    }

    /// Attach a backtrace of the current call stack.
    pub fn capture_stack(self) -> Self {
        let stack = Backtrace::force_capture().to_string();
        self.with_stack_info(stack)
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Final path component of `pathname`
    pub fn filename(&self) -> Option<&str> {
        self.pathname
            .as_deref()
            .and_then(|path| Path::new(path).file_name())
            .and_then(|name| name.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("could not save session")
        }
    }

    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_exception_info_walks_source_chain() {
        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        let info = ExceptionInfo::capture(&err);

        assert_eq!(info.message, "could not save session");
        assert_eq!(info.causes, vec!["disk full".to_string()]);
        assert!(info.kind.as_deref().unwrap().ends_with("Outer"));

        let text = info.to_string();
        assert!(text.contains("could not save session"));
        assert!(text.contains("Caused by:\n    0: disk full"));
    }

    #[test]
    fn test_new_record_captures_thread_and_process() {
        let record = thread::Builder::new()
            .name("worker-7".into())
            .spawn(|| LogRecord::new("test", LogLevel::Info, "hello"))
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(record.thread_name, "worker-7");
        assert_eq!(record.process, std::process::id());
        assert!(record.exc_info.is_none());
        assert!(record.stack_info.is_none());
    }

    #[test]
    fn test_filename_is_last_path_component() {
        let record = LogRecord::new("test", LogLevel::Debug, "x").with_location("src/timer/session.rs", 42);
        assert_eq!(record.filename(), Some("session.rs"));
        assert_eq!(record.lineno, Some(42));
    }
}
