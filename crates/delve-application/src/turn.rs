//! Per-room turn state machine.
//!
//! A [`TurnController`] is bound to one room id for its whole life. Every
//! event of a turn is applied against that id, never against whichever room
//! happens to be current when the event arrives.

use crate::transport::{Transport, TransportEvent, TransportStream, TurnPayload};
use delve_core::activity::{ProcessedEvent, classify};
use delve_core::config::{ClientConfig, Effort};
use delve_core::room::{Message, RoomStore, RoomUpdate, derive_title};
use delve_core::{DelveError, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    /// No turn in flight.
    #[default]
    Idle,
    /// Optimistic message appended, request being dispatched.
    Submitting,
    /// Classified events are being appended to the live timeline.
    Streaming,
    /// Terminal event seen; waiting for loading to clear and the answer to land.
    Finalizing,
}

/// Result of a submit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The turn was dispatched; `message_id` names the optimistic human message.
    Dispatched { message_id: String },
    /// The text was blank after trimming. Nothing happened.
    Blank,
    /// This room already has a turn in flight. Nothing happened.
    Busy,
    /// The turn was cancelled while the transport was accepting it. The
    /// optimistic message stays and the stream is dropped.
    Cancelled { message_id: String },
}

#[derive(Default)]
struct TurnInner {
    state: TurnState,
    /// Incremented per submit; events tagged with an older turn are dropped.
    turn: u64,
    live_timeline: Vec<ProcessedEvent>,
    finalize_seen: bool,
    is_loading: bool,
    error: Option<String>,
    cancel: Option<CancellationToken>,
    pump: Option<JoinHandle<()>>,
}

/// Coordinates one room's turns: submit, live timeline, finalize, archive.
pub struct TurnController {
    room_id: String,
    store: Arc<RoomStore>,
    config: Arc<ClientConfig>,
    inner: Mutex<TurnInner>,
}

impl TurnController {
    /// Creates a controller for `room_id`.
    ///
    /// `live_timeline` seeds the working timeline, usually the room's persisted
    /// `live_snapshot_timeline` so progress survives a reload.
    pub fn new(
        room_id: impl Into<String>,
        store: Arc<RoomStore>,
        config: Arc<ClientConfig>,
        live_timeline: Vec<ProcessedEvent>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            store,
            config,
            inner: Mutex::new(TurnInner {
                live_timeline,
                ..TurnInner::default()
            }),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub async fn state(&self) -> TurnState {
        self.inner.lock().await.state
    }

    /// True while a turn is in flight.
    pub async fn is_busy(&self) -> bool {
        self.inner.lock().await.state != TurnState::Idle
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.lock().await.is_loading
    }

    pub async fn live_timeline(&self) -> Vec<ProcessedEvent> {
        self.inner.lock().await.live_timeline.clone()
    }

    /// Whether the terminal event of the current turn has been seen.
    pub async fn finalize_seen(&self) -> bool {
        self.inner.lock().await.finalize_seen
    }

    /// Last transport error for this room, if any.
    pub async fn error(&self) -> Option<String> {
        self.inner.lock().await.error.clone()
    }

    /// Clears the terminal flag and error when no turn is in flight.
    ///
    /// A running turn keeps its flag so it can still finalize.
    pub async fn reset_if_idle(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == TurnState::Idle {
            inner.finalize_seen = false;
            inner.error = None;
        }
    }

    /// Starts a turn with `text`.
    ///
    /// Blank text and a second submit while a turn is in flight are rejected
    /// without touching the store or the transport. On dispatch, a pump task
    /// is spawned that applies the transport's events to this room.
    pub async fn submit(
        self: &Arc<Self>,
        transport: Arc<dyn Transport>,
        text: &str,
        effort: Effort,
        model: &str,
    ) -> Result<SubmitOutcome> {
        if text.trim().is_empty() {
            tracing::debug!("[TurnController] Ignoring blank submission");
            return Ok(SubmitOutcome::Blank);
        }

        let mut inner = self.inner.lock().await;
        if inner.state != TurnState::Idle {
            tracing::warn!(
                "[TurnController] Room {} already has a turn in flight ({:?})",
                self.room_id,
                inner.state
            );
            return Ok(SubmitOutcome::Busy);
        }

        let room = self
            .store
            .get(&self.room_id)
            .await
            .ok_or_else(|| DelveError::not_found("Room", self.room_id.clone()))?;

        let cancel = CancellationToken::new();
        inner.turn += 1;
        inner.live_timeline.clear();
        inner.finalize_seen = false;
        inner.error = None;
        inner.state = TurnState::Submitting;
        inner.cancel = Some(cancel.clone());
        let turn = inner.turn;

        let message_id = uuid::Uuid::new_v4().to_string();
        let human = Message::human(message_id.clone(), text);

        let mut history = room.messages.clone();
        history.push(human.clone());
        let depth = self.config.efforts.depth(effort);
        let payload = TurnPayload {
            messages: history,
            initial_search_query_count: depth.initial_search_query_count,
            max_research_loops: depth.max_research_loops,
            reasoning_model: self.config.resolve_model(model).to_string(),
        };

        let new_title = (room.messages.is_empty() && room.title == self.store.placeholder_title())
            .then(|| derive_title(&human.content, self.config.title_max_chars));

        self.store
            .modify(&self.room_id, |room| {
                room.live_snapshot_timeline.clear();
                room.messages.push(human);
                if let Some(title) = new_title {
                    room.title = title;
                }
            })
            .await;

        tracing::info!(
            "[TurnController] Submitting turn for room {}: {} messages, effort {}, {} queries, {} loops, model {}",
            self.room_id,
            payload.messages.len(),
            effort,
            payload.initial_search_query_count,
            payload.max_research_loops,
            payload.reasoning_model
        );

        // Unlocked while the transport dispatches so cancel and reads stay live.
        drop(inner);
        let dispatched = transport.submit(payload, cancel.clone()).await;
        let mut inner = self.inner.lock().await;

        let still_current =
            inner.turn == turn && inner.state == TurnState::Submitting && !cancel.is_cancelled();

        match dispatched {
            Ok(stream) if still_current => {
                inner.state = TurnState::Streaming;
                inner.is_loading = true;
                inner.pump = Some(tokio::spawn(Arc::clone(self).pump(turn, stream, cancel)));
                Ok(SubmitOutcome::Dispatched { message_id })
            }
            Ok(_stream) => {
                tracing::info!(
                    "[TurnController] Turn for room {} was cancelled during dispatch",
                    self.room_id
                );
                Ok(SubmitOutcome::Cancelled { message_id })
            }
            Err(e) => {
                tracing::error!(
                    "[TurnController] Transport rejected turn for room {}: {}",
                    self.room_id,
                    e
                );
                if still_current {
                    inner.error = Some(e.to_string());
                    inner.state = TurnState::Idle;
                    inner.is_loading = false;
                    inner.cancel = None;
                }
                Err(e)
            }
        }
    }

    /// Aborts the turn in flight. Returns `false` if there was none.
    ///
    /// The room keeps whatever was last persisted; later events are dropped.
    pub async fn cancel(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state == TurnState::Idle {
            return false;
        }
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        inner.state = TurnState::Idle;
        inner.is_loading = false;
        inner.finalize_seen = false;
        tracing::info!("[TurnController] Cancelled turn for room {}", self.room_id);
        true
    }

    /// Waits for the current pump task, if any, to finish.
    pub async fn join(&self) {
        let handle = self.inner.lock().await.pump.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(
                    "[TurnController] Pump for room {} ended abnormally: {}",
                    self.room_id,
                    e
                );
            }
        }
    }

    async fn pump(self: Arc<Self>, turn: u64, mut stream: TransportStream, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("[TurnController] Pump for room {} cancelled", self.room_id);
                    break;
                }
                event = stream.recv() => event,
            };

            let Some(event) = event else {
                break;
            };
            if !self.apply(turn, event).await {
                break;
            }
        }
        self.finish(turn).await;
    }

    /// Applies one transport event. Returns whether the turn is still open.
    async fn apply(&self, turn: u64, event: TransportEvent) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.turn != turn || inner.state == TurnState::Idle {
            tracing::debug!(
                "[TurnController] Dropping late event for room {}",
                self.room_id
            );
            return false;
        }

        match event {
            TransportEvent::Update(raw) => {
                tracing::debug!(
                    "[TurnController] Room {} received {} event",
                    self.room_id,
                    raw.event_type()
                );
                let classification = classify(&raw);
                if let Some(processed) = classification.event {
                    inner.live_timeline.push(processed);
                    let timeline = inner.live_timeline.clone();
                    self.store
                        .update(&self.room_id, RoomUpdate::live_snapshot_timeline(timeline))
                        .await;
                }
                if classification.terminal {
                    inner.finalize_seen = true;
                    inner.state = TurnState::Finalizing;
                }
            }
            TransportEvent::Messages(messages) => {
                self.store
                    .modify_if(&self.room_id, |room| room.merge_messages(&messages))
                    .await;
            }
            TransportEvent::Loading(loading) => {
                inner.is_loading = loading;
            }
            TransportEvent::Error(message) => {
                tracing::error!(
                    "[TurnController] Transport error in room {}: {}",
                    self.room_id,
                    message
                );
                inner.error = Some(message);
            }
        }

        !self.try_finalize(&mut inner).await
    }

    /// Applies `event` to whatever turn is current. Test hook for driving the
    /// state machine without a pump.
    #[cfg(test)]
    pub(crate) async fn apply_current(&self, event: TransportEvent) -> bool {
        let turn = self.inner.lock().await.turn;
        self.apply(turn, event).await
    }

    /// Archives the live timeline once the terminal event has been seen,
    /// loading has cleared and the newest message is an identified answer.
    async fn try_finalize(&self, inner: &mut TurnInner) -> bool {
        if !inner.finalize_seen || inner.is_loading {
            return false;
        }
        let Some(room) = self.store.get(&self.room_id).await else {
            return false;
        };
        let Some(answer_id) = room.last_message().and_then(Message::ai_id) else {
            return false;
        };

        let answer_id = answer_id.to_string();
        let timeline = inner.live_timeline.clone();
        let archived = timeline.len();
        self.store
            .modify(&self.room_id, |room| {
                room.historical_activities.insert(answer_id.clone(), timeline);
            })
            .await;

        inner.finalize_seen = false;
        inner.state = TurnState::Idle;
        inner.cancel = None;
        tracing::info!(
            "[TurnController] Archived {} events for message {} in room {}",
            archived,
            answer_id,
            self.room_id
        );
        true
    }

    /// Handles the end of the stream. A closed stream means loading is over,
    /// so the turn gets one last chance to finalize before returning to `Idle`.
    async fn finish(&self, turn: u64) {
        let mut inner = self.inner.lock().await;
        if inner.turn != turn || inner.state == TurnState::Idle {
            return;
        }
        inner.is_loading = false;
        if self.try_finalize(&mut inner).await {
            return;
        }
        tracing::warn!(
            "[TurnController] Stream for room {} closed before the turn finalized",
            self.room_id
        );
        inner.state = TurnState::Idle;
        inner.finalize_seen = false;
        inner.cancel = None;
    }
}
