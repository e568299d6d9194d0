//! # Pipeline Setup
//!
//! Wires destinations, queue, listener and the `tracing` subscriber together.
//!
//! ## Configuration
//!
//! [`LoggingConfig`] is built either programmatically from [`Settings`]
//! ([`LoggingConfig::from_settings`]) or from a TOML document
//! ([`LoggingConfig::from_file`]). Both inject the two values that depend on
//! settings: the log directory and the root severity.
//!
//! ```toml
//! queue_capacity = 1024
//! overflow = "block"
//!
//! [fields]
//! level = "levelname"
//! message = "message"
//!
//! [[destinations]]
//! kind = "stdout"
//! min_severity = "DEBUG"
//! format = "simple"
//! filter = "non_error"
//!
//! [[destinations]]
//! kind = "json_file"
//! min_severity = "DEBUG"
//! format = "json"
//! ```
//!
//! ## Teardown
//!
//! [`setup_logging`] returns a [`LoggingGuard`]. Keep it alive for the life of
//! the process; dropping it (or calling [`LoggingGuard::shutdown`]) drains the
//! queue and stops the listener.

use super::filter::{FilterKind, NonErrorFilter};
use super::formatter::{JsonFormatter, RecordFormatter, SimpleFormatter, DEFAULT_FIELD_MAPPING};
use super::handler::Handler;
use super::layer::QueueLayer;
use super::listener::{QueueListener, WorkerState};
use super::queue::{log_queue, OverflowPolicy, QueueClosed, QueueSender};
use super::record::LogRecord;
use super::LoggingError;
use crate::constants::{log_file_name, DEFAULT_LOG_QUEUE_CAPACITY};
use crate::settings::{LogLevel, Settings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Where a destination writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    Stdout,
    Stderr,
    /// `<log_directory>/<log_file_name>`
    JsonFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    Simple,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub kind: DestinationKind,
    #[serde(default = "lowest_severity")]
    pub min_severity: LogLevel,
    pub format: FormatKind,
    #[serde(default)]
    pub filter: Option<FilterKind>,
}

fn lowest_severity() -> LogLevel {
    LogLevel::Debug
}

fn default_queue_capacity() -> usize {
    DEFAULT_LOG_QUEUE_CAPACITY
}

fn default_fields() -> BTreeMap<String, String> {
    DEFAULT_FIELD_MAPPING
        .iter()
        .map(|(key, attribute)| (key.to_string(), attribute.to_string()))
        .collect()
}

/// Complete description of the logging pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Injected from settings
    #[serde(default)]
    pub log_directory: PathBuf,
    /// Injected from settings
    #[serde(default)]
    pub root_severity: LogLevel,
    #[serde(default)]
    pub log_file_name: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
    /// JSON output key -> record attribute
    #[serde(default = "default_fields")]
    pub fields: BTreeMap<String, String>,
    pub destinations: Vec<DestinationConfig>,
}

impl LoggingConfig {
    /// Default wiring: stdout for DEBUG/INFO, stderr for WARNING and above,
    /// and every record as JSON lines in the log file.
    pub fn from_settings(settings: &Settings) -> Result<Self, LoggingError> {
        let mut config = Self {
            log_directory: PathBuf::new(),
            root_severity: LogLevel::Debug,
            log_file_name: String::new(),
            queue_capacity: DEFAULT_LOG_QUEUE_CAPACITY,
            overflow: OverflowPolicy::default(),
            fields: default_fields(),
            destinations: vec![
                DestinationConfig {
                    kind: DestinationKind::Stdout,
                    min_severity: LogLevel::Debug,
                    format: FormatKind::Simple,
                    filter: Some(FilterKind::NonError),
                },
                DestinationConfig {
                    kind: DestinationKind::Stderr,
                    min_severity: LogLevel::Warning,
                    format: FormatKind::Simple,
                    filter: None,
                },
                DestinationConfig {
                    kind: DestinationKind::JsonFile,
                    min_severity: LogLevel::Debug,
                    format: FormatKind::Json,
                    filter: None,
                },
            ],
        };
        config.inject(settings)?;
        Ok(config)
    }

    /// Load a TOML logging document and inject the settings-derived values.
    ///
    /// A missing document is fatal: logging is never partially configured.
    pub fn from_file(path: &Path, settings: &Settings) -> Result<Self, LoggingError> {
        if !path.is_file() {
            return Err(LoggingError::ConfigNotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&text).map_err(|source| LoggingError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.inject(settings)?;
        Ok(config)
    }

    fn inject(&mut self, settings: &Settings) -> Result<(), LoggingError> {
        self.log_directory = settings.logs_dir()?;
        self.root_severity = settings.log_level;
        if self.log_file_name.is_empty() {
            self.log_file_name = log_file_name(&settings.app_name);
        }
        Ok(())
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.log_directory.join(&self.log_file_name)
    }

    /// Construct one handler per destination.
    pub fn build_handlers(&self) -> Result<Vec<Handler>, LoggingError> {
        let json = JsonFormatter::from_keys(&self.fields)?;

        self.destinations
            .iter()
            .map(|destination| -> Result<Handler, LoggingError> {
                let formatter: Box<dyn RecordFormatter> = match destination.format {
                    FormatKind::Simple => Box::new(SimpleFormatter),
                    FormatKind::Json => Box::new(json.clone()),
                };
                let handler = match destination.kind {
                    DestinationKind::Stdout => Handler::stdout(formatter),
                    DestinationKind::Stderr => Handler::stderr(formatter),
                    DestinationKind::JsonFile => Handler::file(&self.log_file_path(), formatter)?,
                };
                let handler = handler.with_min_severity(destination.min_severity);
                Ok(match destination.filter {
                    Some(filter) => handler.with_boxed_filter(filter.build()),
                    None => handler,
                })
            })
            .collect()
    }
}

/// Running queue + listener pair
#[derive(Debug)]
pub struct LoggingPipeline {
    sender: QueueSender,
    listener: QueueListener,
}

impl LoggingPipeline {
    pub fn start(config: &LoggingConfig) -> Result<Self, LoggingError> {
        let handlers = config.build_handlers()?;
        Self::with_handlers(handlers, config.queue_capacity, config.overflow)
    }

    pub fn with_handlers(
        handlers: Vec<Handler>,
        capacity: usize,
        overflow: OverflowPolicy,
    ) -> Result<Self, LoggingError> {
        let (sender, records) = log_queue(capacity, overflow);
        let listener = QueueListener::start(sender.clone(), records, handlers).map_err(LoggingError::Spawn)?;
        Ok(Self { sender, listener })
    }

    /// Producer handle for call sites that build records directly
    pub fn sender(&self) -> QueueSender {
        self.sender.clone()
    }

    pub fn emit(&self, record: LogRecord) -> Result<(), QueueClosed> {
        self.sender.enqueue(record)
    }

    /// Subscriber that routes events at or above `root` into this pipeline
    pub fn subscriber(&self, root: LogLevel) -> impl Subscriber + Send + Sync + 'static {
        tracing_subscriber::registry()
            .with(EnvFilter::new(root.tracing_directive()))
            .with(QueueLayer::new(self.sender()).with_root(root))
    }

    pub fn state(&self) -> WorkerState {
        self.listener.state()
    }

    pub fn dropped(&self) -> u64 {
        self.sender.dropped()
    }

    /// Drain and stop. Dropping the pipeline does the same.
    pub fn shutdown(mut self) {
        self.listener.stop();
    }
}

/// Keeps the global pipeline alive; drains it on drop
#[derive(Debug)]
#[must_use = "dropping the guard stops logging immediately"]
pub struct LoggingGuard {
    pipeline: LoggingPipeline,
    log_file: PathBuf,
}

impl LoggingGuard {
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn pipeline(&self) -> &LoggingPipeline {
        &self.pipeline
    }

    pub fn shutdown(self) {
        self.pipeline.shutdown();
    }
}

/// Set up the default pipeline for `settings` and install it globally.
pub fn setup_logging(settings: &Settings) -> Result<LoggingGuard, LoggingError> {
    init(&LoggingConfig::from_settings(settings)?)
}

/// Start the pipeline described by `config` and install it as the global
/// `tracing` subscriber. Fails if a global subscriber already exists.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let pipeline = LoggingPipeline::start(config)?;

    // On failure the pipeline is dropped here, which stops its listener
    pipeline
        .subscriber(config.root_severity)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    tracing::debug!(
        log_file = %config.log_file_path().display(),
        root = %config.root_severity,
        destinations = config.destinations.len(),
        "logging pipeline started"
    );

    Ok(LoggingGuard {
        pipeline,
        log_file: config.log_file_path(),
    })
}

/// Handlers matching the default wiring, writing into caller-supplied sinks.
///
/// Used where stdout/stderr cannot be captured, such as tests.
pub fn default_handlers_with(
    stdout: Box<dyn std::io::Write + Send>,
    stderr: Box<dyn std::io::Write + Send>,
    log_file: &Path,
) -> Result<Vec<Handler>, LoggingError> {
    Ok(vec![
        Handler::new("stdout", stdout, SimpleFormatter).with_filter(NonErrorFilter),
        Handler::new("stderr", stderr, SimpleFormatter).with_min_severity(LogLevel::Warning),
        Handler::file(log_file, JsonFormatter::default())?,
    ])
}
