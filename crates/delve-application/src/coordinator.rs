//! Session coordination across rooms.
//!
//! `SessionCoordinator` owns one [`TurnController`] per room id. Switching
//! rooms only changes which controller the read views consult; turns already
//! running keep streaming into the room that started them.

use crate::transport::Transport;
use crate::turn::{SubmitOutcome, TurnController};
use delve_core::activity::ProcessedEvent;
use delve_core::config::{ClientConfig, Effort};
use delve_core::room::{Message, RoomStore, RoomUpdate};
use delve_core::{DelveError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Top-level glue between the room store, the transport and the per-room
/// turn controllers.
///
/// `SessionCoordinator` is responsible for:
/// - Entering, opening, creating, switching, renaming and deleting rooms
/// - Routing submissions to the current room's controller
/// - Cancelling turns whose room goes away
/// - Exposing read views of the current room
pub struct SessionCoordinator {
    store: Arc<RoomStore>,
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
    /// Controllers keyed by room id, created on first use.
    controllers: RwLock<HashMap<String, Arc<TurnController>>>,
}

impl SessionCoordinator {
    pub fn new(
        store: Arc<RoomStore>,
        transport: Arc<dyn Transport>,
        config: Arc<ClientConfig>,
    ) -> Self {
        Self {
            store,
            transport,
            config,
            controllers: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<RoomStore> {
        &self.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the controller bound to `room_id`, creating it if needed.
    ///
    /// A new controller starts from the room's persisted live timeline.
    pub async fn controller_for(&self, room_id: &str) -> Arc<TurnController> {
        if let Some(controller) = self.controllers.read().await.get(room_id) {
            return controller.clone();
        }

        let mut controllers = self.controllers.write().await;
        if let Some(controller) = controllers.get(room_id) {
            return controller.clone();
        }

        let live_timeline = self
            .store
            .get(room_id)
            .await
            .map(|room| room.live_snapshot_timeline)
            .unwrap_or_default();
        let controller = Arc::new(TurnController::new(
            room_id,
            self.store.clone(),
            self.config.clone(),
            live_timeline,
        ));
        controllers.insert(room_id.to_string(), controller.clone());
        controller
    }

    async fn current_controller(&self) -> Option<Arc<TurnController>> {
        let room_id = self.store.current_room_id().await?;
        Some(self.controller_for(&room_id).await)
    }

    /// Enters the chat: creates a room if there are none, otherwise switches
    /// to the most recently updated one. Returns the current room id.
    pub async fn enter(&self) -> Result<String> {
        match self.store.most_recent().await {
            Some(room) => {
                self.switch_room(&room.id).await?;
                Ok(room.id)
            }
            None => Ok(self.new_room().await),
        }
    }

    /// Switches to `room_id`, creating the room under that id if it is absent.
    pub async fn open_room(&self, room_id: &str) -> Result<String> {
        if self.store.contains(room_id).await {
            self.switch_room(room_id).await?;
        } else {
            tracing::info!(
                "[SessionCoordinator] Room {} not found, creating it",
                room_id
            );
            self.store.create(None, Some(room_id.to_string())).await;
        }
        Ok(room_id.to_string())
    }

    /// Makes `room_id` current.
    ///
    /// The target room's terminal flag and error are reset unless it has a
    /// turn in flight. Turns in other rooms are left running.
    pub async fn switch_room(&self, room_id: &str) -> Result<()> {
        if !self.store.set_current(room_id).await {
            return Err(DelveError::not_found("Room", room_id));
        }
        self.controller_for(room_id).await.reset_if_idle().await;
        tracing::debug!("[SessionCoordinator] Switched to room {}", room_id);
        Ok(())
    }

    /// Creates a room with the placeholder title and makes it current.
    pub async fn new_room(&self) -> String {
        let room_id = self.store.create(None, None).await;
        tracing::info!("[SessionCoordinator] New room {}", room_id);
        room_id
    }

    /// Deletes the room, cancelling its turn if one is in flight.
    ///
    /// Returns whether a room was removed.
    pub async fn delete_room(&self, room_id: &str) -> bool {
        let controller = self.controllers.write().await.remove(room_id);
        if let Some(controller) = controller {
            controller.cancel().await;
        }
        self.store.delete(room_id).await
    }

    /// Renames the room. Blank titles are ignored.
    ///
    /// Returns whether the room was renamed.
    pub async fn rename_room(&self, room_id: &str, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            tracing::debug!("[SessionCoordinator] Ignoring blank title for {}", room_id);
            return false;
        }
        self.store.update(room_id, RoomUpdate::title(title)).await
    }

    /// Cancels every turn and removes every room.
    pub async fn clear_all_rooms(&self) {
        let controllers: Vec<Arc<TurnController>> = self
            .controllers
            .write()
            .await
            .drain()
            .map(|(_, controller)| controller)
            .collect();
        for controller in controllers {
            controller.cancel().await;
        }
        self.store.clear().await;
    }

    /// Submits `text` to the current room, entering the chat first if no room
    /// is current.
    pub async fn submit_to_current_room(
        &self,
        text: &str,
        effort: Effort,
        model: &str,
    ) -> Result<SubmitOutcome> {
        if text.trim().is_empty() {
            return Ok(SubmitOutcome::Blank);
        }

        let room_id = match self.store.current_room_id().await {
            Some(room_id) => room_id,
            None => self.enter().await?,
        };
        self.controller_for(&room_id)
            .await
            .submit(self.transport.clone(), text, effort, model)
            .await
    }

    /// Cancels the current room's turn. Returns `false` if none was running.
    pub async fn cancel_current_turn(&self) -> bool {
        match self.current_controller().await {
            Some(controller) => controller.cancel().await,
            None => false,
        }
    }

    /// Waits until the pump of `room_id`'s current turn has stopped.
    pub async fn join_turn(&self, room_id: &str) {
        let controller = self.controllers.read().await.get(room_id).cloned();
        if let Some(controller) = controller {
            controller.join().await;
        }
    }

    /// Messages of the current room.
    pub async fn display_messages(&self) -> Vec<Message> {
        self.store
            .current_room()
            .await
            .map(|room| room.messages)
            .unwrap_or_default()
    }

    /// Live timeline of the current room's turn.
    pub async fn live_timeline(&self) -> Vec<ProcessedEvent> {
        match self.current_controller().await {
            Some(controller) => controller.live_timeline().await,
            None => Vec::new(),
        }
    }

    /// Archived timeline for an answer in the current room; empty if none.
    pub async fn historical_timeline_for(&self, message_id: &str) -> Vec<ProcessedEvent> {
        self.store
            .current_room()
            .await
            .and_then(|mut room| room.historical_activities.remove(message_id))
            .unwrap_or_default()
    }

    /// Timeline to show beside `message_id`: the live one while the current
    /// room's last message is still loading, the archived one otherwise.
    pub async fn activity_for(&self, message_id: &str) -> Vec<ProcessedEvent> {
        let Some(room) = self.store.current_room().await else {
            return Vec::new();
        };
        let is_last = room
            .last_message()
            .and_then(|message| message.id.as_deref())
            == Some(message_id);

        if is_last && self.is_loading().await {
            self.live_timeline().await
        } else {
            room.historical_activities
                .get(message_id)
                .cloned()
                .unwrap_or_default()
        }
    }

    /// Whether the current room's turn is loading.
    pub async fn is_loading(&self) -> bool {
        match self.current_controller().await {
            Some(controller) => controller.is_loading().await,
            None => false,
        }
    }

    /// The current room's transport error, if any.
    pub async fn error(&self) -> Option<String> {
        match self.current_controller().await {
            Some(controller) => controller.error().await,
            None => None,
        }
    }
}
