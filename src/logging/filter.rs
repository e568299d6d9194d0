//! Severity filters, evaluated per destination.
//!
//! A filter only decides pass/block; it never mutates the record.

use super::record::LogRecord;
use crate::settings::LogLevel;
use serde::{Deserialize, Serialize};

pub trait RecordFilter: Send + Sync {
    fn allows(&self, record: &LogRecord) -> bool;
}

impl<F> RecordFilter for F
where
    F: Fn(&LogRecord) -> bool + Send + Sync,
{
    fn allows(&self, record: &LogRecord) -> bool {
        self(record)
    }
}

/// Admits DEBUG and INFO, blocks WARNING and above
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonErrorFilter;

impl RecordFilter for NonErrorFilter {
    fn allows(&self, record: &LogRecord) -> bool {
        record.level <= LogLevel::Info
    }
}

/// Complement of [`NonErrorFilter`]: admits WARNING and above
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorOnlyFilter;

impl RecordFilter for ErrorOnlyFilter {
    fn allows(&self, record: &LogRecord) -> bool {
        record.level > LogLevel::Info
    }
}

/// Filter names accepted in the logging document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    NonError,
    ErrorOnly,
}

impl FilterKind {
    pub fn build(self) -> Box<dyn RecordFilter> {
        match self {
            Self::NonError => Box::new(NonErrorFilter),
            Self::ErrorOnly => Box::new(ErrorOnlyFilter),
        }
    }
}
