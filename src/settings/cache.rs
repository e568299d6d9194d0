//! # Settings Cache
//!
//! A memoized accessor for [`Settings`]. The first [`SettingsCache::get`]
//! resolves all sources; later calls hand back the same `Arc` until
//! [`SettingsCache::reload`] is called. Invalidation is always explicit, so a
//! long-running process picks up environment changes only when it asks to.
//!
//! The cache is an ordinary value: construct one at startup and pass it by
//! reference to whatever needs settings.

use super::{Settings, SettingsError, SettingsOverrides, SourceConfig};
use std::sync::{Arc, Mutex, PoisonError};

/// Holds at most one resolved [`Settings`] instance
#[derive(Debug, Default)]
pub struct SettingsCache {
    overrides: SettingsOverrides,
    sources: SourceConfig,
    current: Mutex<Option<Arc<Settings>>>,
}

impl SettingsCache {
    /// Cache resolving from the default prefix and `./.env`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(overrides: SettingsOverrides, sources: SourceConfig) -> Self {
        Self {
            overrides,
            sources,
            current: Mutex::new(None),
        }
    }

    /// Return the cached instance, resolving it on first use.
    pub fn get(&self) -> Result<Arc<Settings>, SettingsError> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(settings) = current.as_ref() {
            return Ok(Arc::clone(settings));
        }

        let settings = Arc::new(Settings::from_sources(self.overrides.clone(), &self.sources)?);
        *current = Some(Arc::clone(&settings));
        Ok(settings)
    }

    /// Drop the cached instance and resolve a fresh one from current sources.
    ///
    /// Holders of the previous `Arc` keep the old values; callers must
    /// re-fetch to observe the new instance.
    pub fn reload(&self) -> Result<Arc<Settings>, SettingsError> {
        self.clear();
        let settings = self.get()?;
        tracing::debug!("settings reloaded");
        Ok(settings)
    }

    /// Forget the cached instance without rebuilding it
    pub fn clear(&self) {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn is_cached(&self) -> bool {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isolated() -> SettingsCache {
        SettingsCache::with_sources(
            SettingsOverrides::default().log_level("debug").ensure_dirs(false),
            SourceConfig::default().without_env_file(),
        )
    }

    #[test]
    fn test_get_returns_same_instance() {
        let cache = isolated();
        assert!(!cache.is_cached());

        let first = cache.get().unwrap();
        let second = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.is_cached());
    }

    #[test]
    fn test_reload_returns_new_instance() {
        let cache = isolated();
        let first = cache.get().unwrap();
        let reloaded = cache.reload().unwrap();
        let after = cache.get().unwrap();

        assert!(!Arc::ptr_eq(&first, &reloaded));
        assert!(Arc::ptr_eq(&reloaded, &after));
        assert_eq!(*first, *reloaded);
    }

    #[test]
    fn test_clear_forgets_instance() {
        let cache = isolated();
        cache.get().unwrap();
        cache.clear();
        assert!(!cache.is_cached());
    }
}
