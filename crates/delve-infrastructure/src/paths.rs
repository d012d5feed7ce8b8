//! Unified path management for Delve files.
//!
//! Everything lives under one configuration directory so a single
//! `--data-dir` override relocates the whole client state.

use std::path::PathBuf;

const APP_DIR_NAME: &str = "delve";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Platform config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find configuration directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for delve_core::DelveError {
    fn from(err: PathError) -> Self {
        delve_core::DelveError::config(err.to_string())
    }
}

/// Path resolver for Delve.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/delve/             # Config directory (or the override)
/// ├── config.toml              # Client configuration
/// └── rooms.json               # Persisted room collection
/// ```
#[derive(Debug, Clone, Default)]
pub struct DelvePaths {
    base_override: Option<PathBuf>,
}

impl DelvePaths {
    /// Creates a resolver. `base_override` replaces the platform config directory.
    pub fn new(base_override: Option<PathBuf>) -> Self {
        Self { base_override }
    }

    /// Returns the Delve configuration directory.
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base_override {
            Some(base) => Ok(base.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR_NAME))
                .ok_or(PathError::ConfigDirNotFound),
        }
    }

    /// Returns the path to `config.toml`.
    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    /// Returns the path to the persisted room collection.
    pub fn rooms_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("rooms.json"))
    }
}
