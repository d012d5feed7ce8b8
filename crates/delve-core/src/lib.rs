//! Domain layer for Delve.
//!
//! Rooms, messages, activity timelines and the pieces that operate on them
//! without knowing about files or the streaming transport.

pub mod activity;
pub mod config;
pub mod error;
pub mod room;

pub use error::{DelveError, Result};
