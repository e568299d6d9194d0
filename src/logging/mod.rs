//! # Logging Infrastructure Module
//!
//! Structured, non-blocking logging built on the `tracing` ecosystem.
//!
//! ## Architecture
//!
//! ```text
//! call site ──tracing event──► QueueLayer ──LogRecord──► bounded queue
//!                                                           │
//!                                              listener thread (one)
//!                                                           │
//!                         ┌─────────────────┬───────────────┴─────────┐
//!                         ▼                 ▼                         ▼
//!                  stdout (simple)   stderr (simple)        log file (JSON lines)
//!                  DEBUG, non-error  WARNING and above      DEBUG and above
//! ```
//!
//! Producers never perform I/O. All formatting and writing happens on the
//! listener thread, which drains every admitted record before it stops.
//!
//! ## Log Levels
//!
//! - **CRITICAL**: `error!(critical = true, ...)`
//! - **ERROR**: failures the caller could not recover from
//! - **WARNING**: recoverable issues, fallbacks
//! - **INFO**: normal operation events
//! - **DEBUG**: detailed execution flow (`trace!` also lands here)
//!
//! ## Usage
//!
//! ```no_run
//! use tomatempo::logging::{log, setup_logging};
//! use tomatempo::settings::Settings;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! let _guard = setup_logging(&settings)?;
//! log::info!(task = "write", "session started");
//! # Ok(())
//! # }
//! ```

pub mod filter;
pub mod formatter;
pub mod handler;
pub mod layer;
pub mod listener;
pub mod queue;
pub mod record;
pub mod setup;

pub use filter::{ErrorOnlyFilter, FilterKind, NonErrorFilter, RecordFilter};
pub use formatter::{FormatterError, JsonFormatter, RecordField, RecordFormatter, SimpleFormatter};
pub use handler::{Handler, MemoryBuffer};
pub use layer::QueueLayer;
pub use listener::{QueueListener, WorkerState};
pub use queue::{log_queue, OverflowPolicy, QueueClosed, QueueSender};
pub use record::{ExceptionInfo, LogRecord};
pub use setup::{
    default_handlers_with, init, setup_logging, DestinationConfig, DestinationKind, FormatKind, LoggingConfig,
    LoggingGuard, LoggingPipeline,
};

use crate::settings::SettingsError;
use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("logging configuration not found at {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("invalid logging configuration in {}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("log record formatting failed")]
    Format(#[from] FormatterError),

    #[error("cannot open log destination {}", path.display())]
    OpenDestination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("failed to spawn the log listener thread")]
    Spawn(#[source] io::Error),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Logging macros for use throughout the application
pub mod log {
    pub use tracing::{debug, error, info, trace, warn};
}
