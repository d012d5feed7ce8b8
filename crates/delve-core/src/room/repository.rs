//! Room repository trait.
//!
//! Defines the interface for persisting the room collection.

use super::model::RoomSnapshot;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract repository for the whole room collection.
///
/// The store always writes the complete snapshot, so implementations only
/// need whole-document load and save.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Loads the persisted snapshot.
    ///
    /// # Returns
    ///
    /// - `Ok(snapshot)`: stored snapshot, or an empty one if nothing was stored yet
    /// - `Err(_)`: storage unreadable or contents corrupt
    async fn load(&self) -> Result<RoomSnapshot>;

    /// Replaces the persisted snapshot.
    async fn save(&self, snapshot: &RoomSnapshot) -> Result<()>;
}
