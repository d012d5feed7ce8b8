use super::id::{IdGenerator, TimestampIdGenerator, fallback_id};
use super::model::{RecencyGroup, Room, RoomSnapshot, RoomUpdate, SNAPSHOT_VERSION};
use super::repository::RoomRepository;
use crate::config::DEFAULT_PLACEHOLDER_TITLE;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

const MAX_ID_ATTEMPTS: usize = 16;

/// Source of truth for all rooms.
///
/// `RoomStore` is responsible for:
/// - Creating, updating and deleting rooms
/// - Tracking which room is current
/// - Ordering rooms by last update
/// - Writing the full collection to the repository after every mutation
///
/// Mutations targeting a room that no longer exists are silent no-ops, so
/// late updates from a turn whose room was deleted never fail.
pub struct RoomStore {
    state: RwLock<StoreState>,
    repository: Arc<dyn RoomRepository>,
    id_generator: Arc<dyn IdGenerator>,
    placeholder_title: String,
}

struct StoreState {
    rooms: Vec<Room>,
    current_room_id: Option<String>,
    /// Latest timestamp handed out; keeps `updated_at` strictly increasing.
    last_issued: DateTime<Utc>,
}

impl StoreState {
    fn position(&self, room_id: &str) -> Option<usize> {
        self.rooms.iter().position(|room| room.id == room_id)
    }

    fn contains(&self, room_id: &str) -> bool {
        self.position(room_id).is_some()
    }

    fn most_recent(&self) -> Option<&Room> {
        self.rooms.iter().max_by_key(|room| room.updated_at)
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = if now > self.last_issued {
            now
        } else {
            self.last_issued + Duration::microseconds(1)
        };
        self.last_issued = next;
        next
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            version: SNAPSHOT_VERSION,
            current_room_id: self.current_room_id.clone(),
            rooms: self.rooms.clone(),
        }
    }
}

impl RoomStore {
    /// Creates an empty store backed by `repository`. Nothing is read.
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self::from_snapshot(repository, RoomSnapshot::default())
    }

    /// Creates a store from the repository's persisted snapshot.
    ///
    /// A load failure (unreadable or corrupt data) is logged and the store
    /// starts empty instead of failing.
    pub async fn load(repository: Arc<dyn RoomRepository>) -> Self {
        let snapshot = match repository.load().await {
            Ok(snapshot) => {
                tracing::debug!("[RoomStore] Loaded {} rooms", snapshot.rooms.len());
                snapshot
            }
            Err(e) => {
                tracing::error!(
                    "[RoomStore] Failed to load rooms, starting empty (recoverable): {}",
                    e
                );
                RoomSnapshot::default()
            }
        };
        Self::from_snapshot(repository, snapshot)
    }

    fn from_snapshot(repository: Arc<dyn RoomRepository>, snapshot: RoomSnapshot) -> Self {
        let last_issued = snapshot
            .rooms
            .iter()
            .map(|room| room.updated_at)
            .max()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut state = StoreState {
            rooms: snapshot.rooms,
            current_room_id: None,
            last_issued,
        };

        // Restore the saved current room, or fall back to the most recent one.
        state.current_room_id = match snapshot.current_room_id {
            Some(id) if state.contains(&id) => Some(id),
            _ => state.most_recent().map(|room| room.id.clone()),
        };

        Self {
            state: RwLock::new(state),
            repository,
            id_generator: Arc::new(TimestampIdGenerator),
            placeholder_title: DEFAULT_PLACEHOLDER_TITLE.to_string(),
        }
    }

    pub fn with_id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn with_placeholder_title(mut self, title: impl Into<String>) -> Self {
        self.placeholder_title = title.into();
        self
    }

    /// Title carried by rooms that have not been named yet.
    pub fn placeholder_title(&self) -> &str {
        &self.placeholder_title
    }

    /// Creates a room, marks it current and returns its id.
    ///
    /// With an explicit `id` that already exists, no room is created; the
    /// existing room becomes current instead. Generated ids are checked against
    /// existing rooms and regenerated on collision.
    pub async fn create(&self, title: Option<String>, id: Option<String>) -> String {
        let mut state = self.state.write().await;

        let room_id = match id {
            Some(id) if state.contains(&id) => {
                tracing::debug!("[RoomStore] Room {} already exists, selecting it", id);
                state.current_room_id = Some(id.clone());
                self.persist(&state).await;
                return id;
            }
            Some(id) => id,
            None => self.unique_id(&state),
        };

        let now = state.next_timestamp();
        let title = title.unwrap_or_else(|| self.placeholder_title.clone());
        state.rooms.push(Room::new(room_id.clone(), title, now));
        state.current_room_id = Some(room_id.clone());

        tracing::info!("[RoomStore] Created room {}", room_id);
        self.persist(&state).await;
        room_id
    }

    fn unique_id(&self, state: &StoreState) -> String {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = self.id_generator.generate();
            if !state.contains(&candidate) {
                return candidate;
            }
            tracing::warn!(
                "[RoomStore] Duplicate room id {} generated, retrying",
                candidate
            );
        }
        loop {
            let candidate = fallback_id();
            if !state.contains(&candidate) {
                return candidate;
            }
        }
    }

    /// Returns a copy of the room.
    pub async fn get(&self, room_id: &str) -> Option<Room> {
        let state = self.state.read().await;
        state.position(room_id).map(|index| state.rooms[index].clone())
    }

    pub async fn contains(&self, room_id: &str) -> bool {
        self.state.read().await.contains(room_id)
    }

    /// Shallow-merges `update` into the room and bumps `updated_at`.
    ///
    /// Returns `false` (and does nothing) if the room does not exist.
    pub async fn update(&self, room_id: &str, update: RoomUpdate) -> bool {
        self.modify(room_id, |room| update.apply(room)).await.is_some()
    }

    /// Applies `f` to the room, bumps `updated_at` and persists.
    ///
    /// Returns `None` without calling `f` if the room does not exist.
    pub async fn modify<F, R>(&self, room_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut Room) -> R,
    {
        let mut state = self.state.write().await;
        let Some(index) = state.position(room_id) else {
            tracing::debug!("[RoomStore] Ignoring update for missing room {}", room_id);
            return None;
        };

        let now = state.next_timestamp();
        let room = &mut state.rooms[index];
        let result = f(room);
        room.updated_at = now;

        self.persist(&state).await;
        Some(result)
    }

    /// Applies `f` to the room; `f` reports whether it changed anything.
    ///
    /// An unchanged room keeps its `updated_at` and is not persisted. Returns
    /// `None` without calling `f` if the room does not exist.
    pub async fn modify_if<F>(&self, room_id: &str, f: F) -> Option<bool>
    where
        F: FnOnce(&mut Room) -> bool,
    {
        let mut state = self.state.write().await;
        let Some(index) = state.position(room_id) else {
            tracing::debug!("[RoomStore] Ignoring update for missing room {}", room_id);
            return None;
        };

        if !f(&mut state.rooms[index]) {
            return Some(false);
        }
        let now = state.next_timestamp();
        state.rooms[index].updated_at = now;

        self.persist(&state).await;
        Some(true)
    }

    /// Removes the room.
    ///
    /// If it was current, the most recently updated remaining room becomes
    /// current, or no room if none remain. Returns whether a room was removed.
    pub async fn delete(&self, room_id: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(index) = state.position(room_id) else {
            return false;
        };
        state.rooms.remove(index);

        if state.current_room_id.as_deref() == Some(room_id) {
            state.current_room_id = state.most_recent().map(|room| room.id.clone());
        }

        tracing::info!(
            "[RoomStore] Deleted room {} (current: {:?})",
            room_id,
            state.current_room_id
        );
        self.persist(&state).await;
        true
    }

    /// Removes every room.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        let removed = state.rooms.len();
        state.rooms.clear();
        state.current_room_id = None;
        tracing::info!("[RoomStore] Cleared {} rooms", removed);
        self.persist(&state).await;
    }

    /// The room with the latest `updated_at`.
    pub async fn most_recent(&self) -> Option<Room> {
        self.state.read().await.most_recent().cloned()
    }

    /// All rooms, most recently updated first.
    pub async fn list(&self) -> Vec<Room> {
        let mut rooms = self.state.read().await.rooms.clone();
        rooms.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rooms
    }

    /// Rooms bucketed by last update relative to `now`. Empty groups are omitted.
    pub async fn grouped_by_recency(&self, now: DateTime<Utc>) -> Vec<(RecencyGroup, Vec<Room>)> {
        let rooms = self.list().await;
        RecencyGroup::ALL
            .iter()
            .filter_map(|group| {
                let members: Vec<Room> = rooms
                    .iter()
                    .filter(|room| RecencyGroup::classify(room.updated_at, now) == *group)
                    .cloned()
                    .collect();
                (!members.is_empty()).then_some((*group, members))
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.rooms.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.rooms.is_empty()
    }

    pub async fn current_room_id(&self) -> Option<String> {
        self.state.read().await.current_room_id.clone()
    }

    pub async fn current_room(&self) -> Option<Room> {
        let state = self.state.read().await;
        state
            .current_room_id
            .as_deref()
            .and_then(|id| state.position(id))
            .map(|index| state.rooms[index].clone())
    }

    /// Marks an existing room as current. Returns `false` if it does not exist.
    pub async fn set_current(&self, room_id: &str) -> bool {
        let mut state = self.state.write().await;
        if !state.contains(room_id) {
            return false;
        }
        if state.current_room_id.as_deref() != Some(room_id) {
            state.current_room_id = Some(room_id.to_string());
            self.persist(&state).await;
        }
        true
    }

    /// Writes the full collection. Failures are logged; in-memory state stays authoritative.
    async fn persist(&self, state: &StoreState) {
        if let Err(e) = self.repository.save(&state.snapshot()).await {
            tracing::warn!("[RoomStore] Failed to persist rooms: {}", e);
        }
    }
}
