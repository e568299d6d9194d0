//! # Platform Directories
//!
//! Resolves the per-user cache, log and config directories for an application
//! identity. Nothing here touches the filesystem; creation is the caller's
//! decision (see [`super::Settings::ensure_dirs`]).
//!
//! ## Locations
//!
//! | Kind   | Linux / BSD                         | macOS                                   | Windows                                          |
//! |--------|-------------------------------------|-----------------------------------------|--------------------------------------------------|
//! | cache  | `$XDG_CACHE_HOME/<app>`             | `~/Library/Caches/<app>`                | `%LOCALAPPDATA%\<author>\<app>\Cache`            |
//! | log    | `$XDG_STATE_HOME/<app>/log`         | `~/Library/Logs/<app>`                  | `<data>\<author>\<app>\Logs`                     |
//! | config | `$XDG_CONFIG_HOME/<app>`            | `~/Library/Application Support/<app>`   | `<data>\<author>\<app>`                          |
//!
//! On Windows `<data>` is `%APPDATA%` when roaming and `%LOCALAPPDATA%` otherwise.
//! The other platforms have no roaming profile and ignore the flag.

use super::SettingsError;
use std::path::PathBuf;

/// Application identity used to derive directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    app_name: String,
    app_author: String,
    roaming: bool,
}

impl AppDirs {
    pub fn new(app_name: impl Into<String>, app_author: impl Into<String>, roaming: bool) -> Self {
        Self {
            app_name: app_name.into(),
            app_author: app_author.into(),
            roaming,
        }
    }

    /// Per-user cache directory
    pub fn user_cache_dir(&self) -> Result<PathBuf, SettingsError> {
        let path = if cfg!(target_os = "windows") {
            self.vendor_dir(dirs::data_local_dir(), "cache")?.join("Cache")
        } else {
            // macOS: ~/Library/Caches, elsewhere $XDG_CACHE_HOME or ~/.cache
            Self::base(dirs::cache_dir(), "cache")?.join(&self.app_name)
        };
        Ok(path)
    }

    /// Per-user log directory
    pub fn user_log_dir(&self) -> Result<PathBuf, SettingsError> {
        let path = if cfg!(target_os = "windows") {
            self.user_data_dir()?.join("Logs")
        } else if cfg!(target_os = "macos") {
            Self::base(dirs::home_dir(), "log")?
                .join("Library")
                .join("Logs")
                .join(&self.app_name)
        } else {
            // Logs are state, not data: $XDG_STATE_HOME or ~/.local/state
            let state = dirs::state_dir().or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")));
            Self::base(state, "log")?.join(&self.app_name).join("log")
        };
        Ok(path)
    }

    /// Per-user config directory
    pub fn user_config_dir(&self) -> Result<PathBuf, SettingsError> {
        if cfg!(target_os = "windows") {
            self.user_data_dir()
        } else {
            Ok(Self::base(dirs::config_dir(), "config")?.join(&self.app_name))
        }
    }

    /// Windows data directory, honouring the roaming flag
    fn user_data_dir(&self) -> Result<PathBuf, SettingsError> {
        let base = if self.roaming {
            dirs::data_dir()
        } else {
            dirs::data_local_dir()
        };
        self.vendor_dir(base, "data")
    }

    fn vendor_dir(&self, base: Option<PathBuf>, kind: &'static str) -> Result<PathBuf, SettingsError> {
        Ok(Self::base(base, kind)?.join(&self.app_author).join(&self.app_name))
    }

    fn base(base: Option<PathBuf>, kind: &'static str) -> Result<PathBuf, SettingsError> {
        base.ok_or(SettingsError::NoPlatformDirectory { kind })
    }
}
