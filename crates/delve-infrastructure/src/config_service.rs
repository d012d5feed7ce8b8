//! Configuration service implementation.
//!
//! This module provides a ConfigService that loads the client configuration
//! from the configuration file (~/.config/delve/config.toml).

use crate::paths::DelvePaths;
use crate::storage::AtomicFile;
use delve_core::Result;
use delve_core::config::ClientConfig;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Configuration service that loads and caches the client configuration.
///
/// A missing file yields `ClientConfig::default()`; nothing is written until
/// [`ConfigService::write_defaults`] is called.
#[derive(Debug, Clone)]
pub struct ConfigService {
    paths: DelvePaths,
    /// Cached configuration loaded from file.
    config: Arc<RwLock<Option<ClientConfig>>>,
}

impl ConfigService {
    /// Creates a new ConfigService. The file is read lazily on first access.
    pub fn new(paths: DelvePaths) -> Self {
        Self {
            paths,
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config_path(&self) -> Result<PathBuf> {
        Ok(self.paths.config_file()?)
    }

    /// Gets the configuration, loading from file if not cached.
    ///
    /// Read or parse failures are logged and the defaults are used instead.
    pub fn get_config(&self) -> ClientConfig {
        {
            let read_lock = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(ref cached) = *read_lock {
                return cached.clone();
            }
        }

        let loaded = self.load().unwrap_or_else(|e| {
            tracing::warn!("[ConfigService] Failed to load config, using defaults: {}", e);
            ClientConfig::default()
        });

        {
            let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
            *write_lock = Some(loaded.clone());
        }

        loaded
    }

    /// Reads `config.toml` without touching the cache.
    pub fn load(&self) -> Result<ClientConfig> {
        let path = self.config_path()?;
        let config = AtomicFile::<ClientConfig>::toml(path.clone())
            .load()?
            .unwrap_or_else(|| {
                tracing::debug!(
                    "[ConfigService] No config at {}, using defaults",
                    path.display()
                );
                ClientConfig::default()
            });
        Ok(config)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = None;
    }

    /// Writes the default configuration to `config.toml`.
    ///
    /// An existing file is left alone unless `overwrite` is set. Returns
    /// whether a file was written.
    pub fn write_defaults(&self, overwrite: bool) -> Result<bool> {
        let path = self.config_path()?;
        if path.exists() && !overwrite {
            tracing::info!(
                "[ConfigService] Config already exists at {}",
                path.display()
            );
            return Ok(false);
        }

        AtomicFile::<ClientConfig>::toml(path.clone()).replace(&ClientConfig::default())?;
        tracing::info!("[ConfigService] Wrote default config to {}", path.display());
        self.invalidate_cache();
        Ok(true)
    }
}
