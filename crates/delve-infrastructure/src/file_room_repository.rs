//! File-based RoomRepository implementation.
//!
//! The whole room collection lives in one pretty-printed JSON document
//! (`rooms.json`). Writes are atomic so a crash mid-save leaves the previous
//! snapshot intact.

use crate::paths::DelvePaths;
use crate::storage::AtomicFile;
use async_trait::async_trait;
use delve_core::room::{RoomRepository, RoomSnapshot, SNAPSHOT_VERSION};
use delve_core::{DelveError, Result};
use std::path::{Path, PathBuf};

/// A repository implementation that stores the room snapshot as a JSON file.
#[derive(Debug, Clone)]
pub struct FileRoomRepository {
    file_path: PathBuf,
}

impl FileRoomRepository {
    /// Creates a repository backed by `file_path`.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    /// Creates a repository at the resolved `rooms.json` location.
    pub fn from_paths(paths: &DelvePaths) -> Result<Self> {
        Ok(Self::new(paths.rooms_file()?))
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn load_blocking(path: PathBuf) -> Result<RoomSnapshot> {
        let file = AtomicFile::<RoomSnapshot>::json(path);
        match file.load() {
            Ok(Some(snapshot)) => {
                if snapshot.version > SNAPSHOT_VERSION {
                    tracing::warn!(
                        "[FileRoomRepository] Snapshot version {} is newer than supported {}",
                        snapshot.version,
                        SNAPSHOT_VERSION
                    );
                }
                tracing::debug!(
                    "[FileRoomRepository] Loaded {} rooms from {}",
                    snapshot.rooms.len(),
                    file.path().display()
                );
                Ok(snapshot)
            }
            Ok(None) => Ok(RoomSnapshot::default()),
            Err(err) if err.is_parse_error() => {
                match file.quarantine() {
                    Ok(copy) => tracing::warn!(
                        "[FileRoomRepository] Unreadable room file preserved at {}",
                        copy.display()
                    ),
                    Err(copy_err) => tracing::warn!(
                        "[FileRoomRepository] Failed to preserve unreadable room file: {}",
                        copy_err
                    ),
                }
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn save_blocking(path: PathBuf, snapshot: RoomSnapshot) -> Result<()> {
        AtomicFile::<RoomSnapshot>::json(path).replace(&snapshot)?;
        Ok(())
    }
}

fn join_error(err: tokio::task::JoinError) -> DelveError {
    DelveError::internal(format!("Storage task failed: {}", err))
}

#[async_trait]
impl RoomRepository for FileRoomRepository {
    async fn load(&self) -> Result<RoomSnapshot> {
        let path = self.file_path.clone();
        tokio::task::spawn_blocking(move || Self::load_blocking(path))
            .await
            .map_err(join_error)?
    }

    async fn save(&self, snapshot: &RoomSnapshot) -> Result<()> {
        let path = self.file_path.clone();
        let snapshot = snapshot.clone();
        tokio::task::spawn_blocking(move || Self::save_blocking(path, snapshot))
            .await
            .map_err(join_error)?
    }
}
