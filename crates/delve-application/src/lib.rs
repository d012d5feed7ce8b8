//! Application layer for Delve.
//!
//! This crate drives conversations: it binds rooms from `delve-core` to a
//! streaming [`Transport`] and reconciles the streamed progress events into
//! each room's activity timelines.

pub mod coordinator;
pub mod transport;
pub mod turn;

pub use coordinator::SessionCoordinator;
pub use transport::{Transport, TransportEvent, TransportStream, TurnPayload};
pub use turn::{SubmitOutcome, TurnController, TurnState};
