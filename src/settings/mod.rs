//! # Settings Resolution Module
//!
//! Builds the validated, application-wide [`Settings`] value from four sources,
//! highest precedence first:
//!
//! 1. explicit values passed to the constructor ([`SettingsOverrides`])
//! 2. environment variables with the `APP_` prefix (e.g. `APP_ENVIRONMENT=prod`)
//! 3. the local `.env` file, if present
//! 4. compiled-in defaults
//!
//! ## Validation
//!
//! `environment` and `log_level` are enumerations. Input is matched
//! case-insensitively and normalized (`"PROD"` becomes `prod`, `"warning"`
//! becomes `WARNING`); anything outside the set is rejected with
//! [`SettingsError::Validation`], never replaced by a default.
//!
//! ## Directories
//!
//! Cache, log and config directories come from [`AppDirs`]. With
//! `ensure_dirs` enabled each accessor creates its directory (and parents) as
//! a side effect of being read. Creation is idempotent.

mod cache;
mod dirs;
mod sources;

pub use cache::SettingsCache;
pub use dirs::AppDirs;
pub use sources::{parse_bool, Sections, SettingsOverrides, SourceConfig, SourceValues};

use crate::constants::{log_file_name, APP_AUTHOR, APP_NAME, DEFAULT_DATABASE_URL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Errors raised while resolving or validating settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// An enumerated field received a value outside its allowed set
    #[error("invalid {field} {value}. Use {allowed:?}.")]
    Validation {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("invalid boolean for {field}: {value:?}")]
    InvalidBool { field: String, value: String },

    #[error("could not determine the user {kind} directory on this platform")]
    NoPlatformDirectory { kind: &'static str },

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read env file {}: {message}", path.display())]
    EnvFile { path: PathBuf, message: String },
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Environment {
    #[default]
    Dev,
    Staging,
    Prod,
    Test,
}

impl Environment {
    pub const ALL: [Environment; 4] = [Self::Dev, Self::Staging, Self::Prod, Self::Test];
    pub const NAMES: &'static [&'static str] = &["dev", "staging", "prod", "test"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
            Self::Test => "test",
        }
    }
}

impl FromStr for Environment {
    type Err = SettingsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|env| env.as_str() == value)
            .ok_or(SettingsError::Validation {
                field: "environment",
                value,
                allowed: Self::NAMES,
            })
    }
}

impl TryFrom<String> for Environment {
    type Error = SettingsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [Self::Debug, Self::Info, Self::Warning, Self::Error, Self::Critical];
    pub const NAMES: &'static [&'static str] = &["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Severity rank: DEBUG=10, INFO=20, WARNING=30, ERROR=40, CRITICAL=50
    pub fn numeric(self) -> u8 {
        match self {
            Self::Debug => 10,
            Self::Info => 20,
            Self::Warning => 30,
            Self::Error => 40,
            Self::Critical => 50,
        }
    }

    pub fn from_numeric(rank: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.numeric() == rank)
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    ///
    /// tracing has no level above ERROR, so CRITICAL shares its directive.
    pub fn tracing_directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = SettingsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.to_uppercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == value)
            .ok_or(SettingsError::Validation {
                field: "log_level",
                value,
                allowed: Self::NAMES,
            })
    }
}

impl TryFrom<String> for LogLevel {
    type Error = SettingsError;

    // `Self::Error` would name the ERROR variant here
    fn try_from(value: String) -> Result<Self, SettingsError> {
        value.parse()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved application settings
///
/// Construct with [`Settings::load`] (all sources, no overrides),
/// [`Settings::new`] (with explicit values) or [`Settings::from_sources`]
/// (custom prefix or env file). `environment` and `log_level` are typed, so a
/// constructed value can never hold anything outside their enumerations; the
/// string setters re-run validation for callers holding raw input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Application identity for directory resolution
    pub app_name: String,
    pub app_author: String,

    /// Use the roaming profile on platforms that have one
    pub roaming: bool,

    /// Create directories as a side effect of reading them
    pub ensure_dirs: bool,

    pub environment: Environment,
    pub log_level: LogLevel,

    /// Opaque database connection string
    pub database_url: String,

    sections: Sections,
}

impl Default for Settings {
    /// Compiled-in defaults, the lowest-precedence source
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            app_author: APP_AUTHOR.to_string(),
            roaming: true,
            ensure_dirs: true,
            environment: Environment::Dev,
            log_level: LogLevel::Info,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            sections: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Resolve from environment, `./.env` and defaults.
    pub fn load() -> Result<Self, SettingsError> {
        Self::new(SettingsOverrides::default())
    }

    /// Resolve with explicit values taking precedence over every other source.
    pub fn new(overrides: SettingsOverrides) -> Result<Self, SettingsError> {
        Self::from_sources(overrides, &SourceConfig::default())
    }

    pub fn from_sources(overrides: SettingsOverrides, sources: &SourceConfig) -> Result<Self, SettingsError> {
        let source = sources.read()?;
        let defaults = Self::default();

        let text = |explicit: Option<String>, field: &str, default: String| {
            explicit.or_else(|| source.get(field).map(str::to_string)).unwrap_or(default)
        };
        let flag = |explicit: Option<bool>, field: &str, default: bool| -> Result<bool, SettingsError> {
            match explicit {
                Some(value) => Ok(value),
                None => Ok(source.get_bool(field)?.unwrap_or(default)),
            }
        };

        let environment = match overrides.environment.as_deref().or(source.get("environment")) {
            Some(raw) => raw.parse()?,
            None => defaults.environment,
        };
        let log_level = match overrides.log_level.as_deref().or(source.get("log_level")) {
            Some(raw) => raw.parse()?,
            None => defaults.log_level,
        };

        let app_name = text(overrides.app_name, "app_name", defaults.app_name);
        let app_author = text(overrides.app_author, "app_author", defaults.app_author);
        let database_url = text(overrides.database_url, "database_url", defaults.database_url);
        let roaming = flag(overrides.roaming, "roaming", defaults.roaming)?;
        let ensure_dirs = flag(overrides.ensure_dirs, "ensure_dirs", defaults.ensure_dirs)?;

        let settings = Self {
            app_name,
            app_author,
            roaming,
            ensure_dirs,
            environment,
            log_level,
            database_url,
            sections: source.into_sections(),
        };

        tracing::debug!(
            environment = %settings.environment,
            log_level = %settings.log_level,
            "settings resolved"
        );
        Ok(settings)
    }

    /// Reassign `environment` from raw input, validating it first.
    pub fn set_environment(&mut self, raw: &str) -> Result<(), SettingsError> {
        self.environment = raw.parse()?;
        Ok(())
    }

    /// Reassign `log_level` from raw input, validating it first.
    pub fn set_log_level(&mut self, raw: &str) -> Result<(), SettingsError> {
        self.log_level = raw.parse()?;
        Ok(())
    }

    pub fn log_level_numeric(&self) -> u8 {
        self.log_level.numeric()
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }

    /// Development conveniences are on in `dev` and `test`
    pub fn debug(&self) -> bool {
        matches!(self.environment, Environment::Dev | Environment::Test)
    }

    /// Nested section sourced from `APP_<SECTION>__<KEY>` entries
    pub fn section(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(&name.to_ascii_lowercase())
    }

    pub fn dirs(&self) -> AppDirs {
        AppDirs::new(&self.app_name, &self.app_author, self.roaming)
    }

    /// Per-user cache directory for this application.
    ///
    /// ## Directory Creation
    ///
    /// Paths are resolved on every call, never stored. When `ensure_dirs` is
    /// set the directory is created on first access; repeated calls are
    /// idempotent. With `ensure_dirs` off the path is only computed.
    ///
    /// The same rule applies to [`Settings::logs_dir`] and
    /// [`Settings::config_dir`].
    pub fn cache_dir(&self) -> Result<PathBuf, SettingsError> {
        self.prepare(self.dirs().user_cache_dir()?)
    }

    /// Per-user log directory (`<state>/<app>/log` on Linux)
    pub fn logs_dir(&self) -> Result<PathBuf, SettingsError> {
        self.prepare(self.dirs().user_log_dir()?)
    }

    pub fn config_dir(&self) -> Result<PathBuf, SettingsError> {
        self.prepare(self.dirs().user_config_dir()?)
    }

    /// `<logs_dir>/log_<app_name>.jsonl`
    ///
    /// Creates the log directory under the same conditions as
    /// [`Settings::logs_dir`]. The file itself is left to the file handler.
    pub fn log_file_path(&self) -> Result<PathBuf, SettingsError> {
        Ok(self.logs_dir()?.join(log_file_name(&self.app_name)))
    }

    fn prepare(&self, path: PathBuf) -> Result<PathBuf, SettingsError> {
        if self.ensure_dirs {
            fs::create_dir_all(&path).map_err(|source| SettingsError::CreateDir {
                path: path.clone(),
                source,
            })?;
        }
        Ok(path)
    }

    /// Snapshot of stored and computed fields.
    ///
    /// ## Computed Fields
    ///
    /// - `log_level_numeric`: 10 through 50, DEBUG through CRITICAL
    /// - `is_prod`: environment is `prod`
    /// - `debug`: environment is `dev` or `test`
    /// - `cache_dir`, `logs_dir`, `config_dir`: `None` when the platform has
    ///   no home directory
    ///
    /// Directories are resolved without being created, so a summary is safe
    /// to take from read-only contexts.
    pub fn summary(&self) -> SettingsSummary {
        let dirs = self.dirs();
        SettingsSummary {
            app_name: self.app_name.clone(),
            app_author: self.app_author.clone(),
            roaming: self.roaming,
            ensure_dirs: self.ensure_dirs,
            environment: self.environment,
            log_level: self.log_level,
            database_url: self.database_url.clone(),
            log_level_numeric: self.log_level_numeric(),
            is_prod: self.is_prod(),
            debug: self.debug(),
            cache_dir: dirs.user_cache_dir().ok(),
            logs_dir: dirs.user_log_dir().ok(),
            config_dir: dirs.user_config_dir().ok(),
        }
    }
}

/// Serializable view of [`Settings`] including computed properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsSummary {
    pub app_name: String,
    pub app_author: String,
    pub roaming: bool,
    pub ensure_dirs: bool,
    pub environment: Environment,
    pub log_level: LogLevel,
    pub database_url: String,
    pub log_level_numeric: u8,
    pub is_prod: bool,
    pub debug: bool,
    pub cache_dir: Option<PathBuf>,
    pub logs_dir: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
}
