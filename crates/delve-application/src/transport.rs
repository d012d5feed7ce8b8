//! Streaming transport contract.
//!
//! The agent backend is reached through a [`Transport`]. Each submitted turn
//! yields one channel of [`TransportEvent`]s consumed by exactly one
//! `TurnController`. Aborting a turn is done by cancelling the token passed
//! to [`Transport::submit`].

use async_trait::async_trait;
use delve_core::Result;
use delve_core::activity::RawEvent;
use delve_core::room::Message;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Request body sent to the agent for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnPayload {
    /// Full room history including the message being submitted.
    pub messages: Vec<Message>,
    pub initial_search_query_count: u32,
    pub max_research_loops: u32,
    pub reasoning_model: String,
}

/// One signal from the transport while a turn is open.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A streamed progress update.
    Update(RawEvent),
    /// The transport's current view of the conversation.
    Messages(Vec<Message>),
    /// The transport's loading flag changed.
    Loading(bool),
    /// The transport failed.
    Error(String),
}

/// Receiving end of one turn's events. Closing it ends the turn.
pub type TransportStream = mpsc::UnboundedReceiver<TransportEvent>;

/// Bidirectional streaming client for the agent backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatches `payload` and returns the turn's event stream.
    ///
    /// Implementations should stop producing events once `cancel` fires.
    async fn submit(&self, payload: TurnPayload, cancel: CancellationToken)
    -> Result<TransportStream>;
}
