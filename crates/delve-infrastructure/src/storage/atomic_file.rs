//! Atomic file operations for JSON and TOML documents.
//!
//! Writes go through a temporary sibling file, are fsynced and renamed into
//! place, so readers only ever see a complete document.

use delve_core::DelveError;
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// On-disk encoding of an [`AtomicFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStrategy {
    Json,
    Toml,
}

impl FormatStrategy {
    fn name(&self) -> &'static str {
        match self {
            FormatStrategy::Json => "JSON",
            FormatStrategy::Toml => "TOML",
        }
    }
}

/// Errors that can occur during atomic file operations.
#[derive(Debug)]
pub enum AtomicFileError {
    /// File I/O error.
    IoError(std::io::Error),
    /// The document could not be parsed.
    ParseError {
        format: FormatStrategy,
        message: String,
    },
    /// The value could not be encoded.
    EncodeError {
        format: FormatStrategy,
        message: String,
    },
    /// File locking error.
    LockError(String),
}

impl std::fmt::Display for AtomicFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomicFileError::IoError(e) => write!(f, "I/O error: {}", e),
            AtomicFileError::ParseError { format, message } => {
                write!(f, "{} parse error: {}", format.name(), message)
            }
            AtomicFileError::EncodeError { format, message } => {
                write!(f, "{} serialization error: {}", format.name(), message)
            }
            AtomicFileError::LockError(e) => write!(f, "Lock error: {}", e),
        }
    }
}

impl std::error::Error for AtomicFileError {}

impl AtomicFileError {
    /// True when the file exists but its contents are not a valid document.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, AtomicFileError::ParseError { .. })
    }
}

impl From<std::io::Error> for AtomicFileError {
    fn from(e: std::io::Error) -> Self {
        AtomicFileError::IoError(e)
    }
}

impl From<AtomicFileError> for DelveError {
    fn from(err: AtomicFileError) -> Self {
        match err {
            AtomicFileError::IoError(e) => e.into(),
            AtomicFileError::ParseError { format, message }
            | AtomicFileError::EncodeError { format, message } => DelveError::Serialization {
                format: format.name().to_string(),
                message,
            },
            AtomicFileError::LockError(message) => DelveError::io(message),
        }
    }
}

/// A handle to a document file with atomic replace semantics.
///
/// Provides:
/// - **Atomicity**: Updates are all-or-nothing via tmp file + atomic rename
/// - **Isolation**: File locking serializes concurrent writers
/// - **Durability**: Explicit fsync before rename
pub struct AtomicFile<T> {
    path: PathBuf,
    format: FormatStrategy,
    _phantom: PhantomData<T>,
}

impl<T> AtomicFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf, format: FormatStrategy) -> Self {
        Self {
            path,
            format,
            _phantom: PhantomData,
        }
    }

    pub fn json(path: PathBuf) -> Self {
        Self::new(path, FormatStrategy::Json)
    }

    pub fn toml(path: PathBuf) -> Self {
        Self::new(path, FormatStrategy::Toml)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the file.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>, AtomicFileError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        let data = match self.format {
            FormatStrategy::Json => serde_json::from_str(&content).map_err(|e| e.to_string()),
            FormatStrategy::Toml => toml::from_str(&content).map_err(|e| e.to_string()),
        }
        .map_err(|message| AtomicFileError::ParseError {
            format: self.format,
            message,
        })?;

        Ok(Some(data))
    }

    /// Serializes `data` and atomically replaces the file.
    pub fn save(&self, data: &T) -> Result<(), AtomicFileError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let encoded = match self.format {
            FormatStrategy::Json => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
            FormatStrategy::Toml => toml::to_string_pretty(data).map_err(|e| e.to_string()),
        }
        .map_err(|message| AtomicFileError::EncodeError {
            format: self.format,
            message,
        })?;

        // Write to temporary file in the same directory
        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(encoded.as_bytes())?;

        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Replaces the file while holding the exclusive lock.
    ///
    /// Concurrent writers are serialized, so the last writer wins with a
    /// complete document. Existing contents are never read, so a corrupt file
    /// is simply overwritten.
    pub fn replace(&self, data: &T) -> Result<(), AtomicFileError> {
        let _lock = FileLock::acquire(&self.path)?;
        self.save(data)
    }

    /// Copies the current file aside as `<name>.corrupt` and returns that path.
    pub fn quarantine(&self) -> Result<PathBuf, AtomicFileError> {
        let file_name = self.file_name()?;
        let target = self.path.with_file_name(format!("{}.corrupt", file_name));
        fs::copy(&self.path, &target)?;
        Ok(target)
    }

    fn file_name(&self) -> Result<String, AtomicFileError> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AtomicFileError::IoError(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "Path has no file name",
                ))
            })
    }

    fn temp_path(&self) -> Result<PathBuf, AtomicFileError> {
        let parent = self.path.parent().ok_or_else(|| {
            AtomicFileError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            ))
        })?;

        Ok(parent.join(format!(".{}.tmp", self.file_name()?)))
    }
}

/// A file lock guard that releases the lock when dropped.
struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, AtomicFileError> {
        let lock_path = path.with_extension("lock");

        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| AtomicFileError::LockError(format!("Failed to acquire lock: {}", e)))?;
        }

        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Best effort; the lock itself is released with the handle.
        let _ = fs::remove_file(&self.lock_path);
    }
}
