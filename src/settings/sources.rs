//! # Settings Sources
//!
//! Raw, unvalidated values are gathered from two textual sources before the
//! resolver in [`super::Settings`] applies precedence and validation:
//!
//! 1. process environment variables named `<PREFIX><FIELD>`
//! 2. `KEY=value` lines from the local env file, same naming
//!
//! Explicit constructor values ([`SettingsOverrides`]) sit above both and the
//! compiled-in defaults sit below both. Matching on names is case-insensitive
//! so `app_log_level`, `APP_LOG_LEVEL` and `App_Log_Level` are the same key.
//!
//! Keys carrying the nested delimiter (`APP_DATABASE__POOL`) are split into a
//! section/key pair and kept apart from the flat fields.

use super::SettingsError;
use crate::constants::{ENV_FILE, ENV_NESTED_DELIMITER, ENV_PREFIX};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Nested settings sections: section name -> (key -> raw value)
pub type Sections = BTreeMap<String, BTreeMap<String, String>>;

/// Values passed explicitly when constructing [`super::Settings`].
///
/// Every field left as `None` falls through to the environment, then to the
/// env file, then to the default. String-typed enumerations are validated the
/// same way as values read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub app_name: Option<String>,
    pub app_author: Option<String>,
    pub roaming: Option<bool>,
    pub ensure_dirs: Option<bool>,
    pub environment: Option<String>,
    pub log_level: Option<String>,
    pub database_url: Option<String>,
}

impl SettingsOverrides {
    pub fn environment(mut self, value: impl Into<String>) -> Self {
        self.environment = Some(value.into());
        self
    }

    pub fn log_level(mut self, value: impl Into<String>) -> Self {
        self.log_level = Some(value.into());
        self
    }

    pub fn database_url(mut self, value: impl Into<String>) -> Self {
        self.database_url = Some(value.into());
        self
    }

    pub fn app_name(mut self, value: impl Into<String>) -> Self {
        self.app_name = Some(value.into());
        self
    }

    pub fn app_author(mut self, value: impl Into<String>) -> Self {
        self.app_author = Some(value.into());
        self
    }

    pub fn roaming(mut self, value: bool) -> Self {
        self.roaming = Some(value);
        self
    }

    pub fn ensure_dirs(mut self, value: bool) -> Self {
        self.ensure_dirs = Some(value);
        self
    }
}

/// Where textual settings come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Prefix every recognised key must start with (matched case-insensitively)
    pub env_prefix: String,
    /// Env file to read; `None` disables the file source entirely
    pub env_file: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            env_prefix: ENV_PREFIX.to_string(),
            env_file: Some(PathBuf::from(ENV_FILE)),
        }
    }
}

impl SourceConfig {
    /// Use a specific env file instead of `./.env`
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Ignore env files entirely
    pub fn without_env_file(mut self) -> Self {
        self.env_file = None;
        self
    }

    /// Read both textual sources and merge them, environment over file.
    pub fn read(&self) -> Result<SourceValues, SettingsError> {
        let mut merged = self.read_env_file()?;
        let env = self.collect(
            std::env::vars_os()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?))),
        );
        merged.overlay(env);
        Ok(merged)
    }

    fn read_env_file(&self) -> Result<SourceValues, SettingsError> {
        let Some(path) = self.env_file.as_ref().filter(|path| path.is_file()) else {
            return Ok(SourceValues::default());
        };

        let env_file_error = |err: dotenvy::Error| SettingsError::EnvFile {
            path: path.clone(),
            message: err.to_string(),
        };

        let mut pairs = Vec::new();
        for item in dotenvy::from_path_iter(path).map_err(env_file_error)? {
            pairs.push(item.map_err(env_file_error)?);
        }

        tracing::debug!(path = %path.display(), entries = pairs.len(), "read env file");
        Ok(self.collect(pairs))
    }

    /// Keep prefixed keys, strip the prefix and sort them into flat or nested.
    fn collect(&self, pairs: impl IntoIterator<Item = (String, String)>) -> SourceValues {
        let prefix = self.env_prefix.to_ascii_lowercase();
        let mut values = SourceValues::default();

        for (key, value) in pairs {
            let key = key.to_ascii_lowercase();
            let Some(name) = key.strip_prefix(&prefix) else {
                continue;
            };

            match name.split_once(ENV_NESTED_DELIMITER) {
                Some((section, child)) if !section.is_empty() && !child.is_empty() => {
                    values
                        .sections
                        .entry(section.to_string())
                        .or_default()
                        .insert(child.to_string(), value);
                }
                Some(_) => {}
                None if !name.is_empty() => {
                    values.flat.insert(name.to_string(), value);
                }
                None => {}
            }
        }

        values
    }
}

/// Raw values keyed by lowercase field name, prefix already stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceValues {
    flat: HashMap<String, String>,
    sections: Sections,
}

impl SourceValues {
    /// Raw value for a top-level field
    pub fn get(&self, field: &str) -> Option<&str> {
        self.flat.get(field).map(String::as_str)
    }

    /// Boolean field with the usual truthy/falsy spellings
    pub fn get_bool(&self, field: &str) -> Result<Option<bool>, SettingsError> {
        self.get(field).map(|raw| parse_bool(field, raw)).transpose()
    }

    pub fn sections(&self) -> &Sections {
        &self.sections
    }

    pub(crate) fn into_sections(self) -> Sections {
        self.sections
    }

    /// Entries in `higher` win over entries already present.
    fn overlay(&mut self, higher: SourceValues) {
        self.flat.extend(higher.flat);
        for (section, entries) in higher.sections {
            self.sections.entry(section).or_default().extend(entries);
        }
    }
}

/// Parse a boolean-like string: `1/0`, `true/false`, `yes/no`, `on/off`, `y/n`, `t/f`.
pub fn parse_bool(field: &str, raw: &str) -> Result<bool, SettingsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        _ => Err(SettingsError::InvalidBool {
            field: field.to_string(),
            value: raw.to_string(),
        }),
    }
}
