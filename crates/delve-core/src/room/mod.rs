//! Room domain module.
//!
//! This module contains the room model, conversation messages, the
//! repository interface for persistence and the `RoomStore` that owns
//! every room at runtime.
//!
//! # Module Structure
//!
//! - `model`: `Room`, `RoomUpdate`, `RoomSnapshot`, `RecencyGroup`
//! - `message`: `Message`, `MessageKind`, `MessageContent`
//! - `repository`: `RoomRepository` trait
//! - `id`: room id generation
//! - `store`: `RoomStore`

mod id;
mod message;
mod model;
mod repository;
mod store;

pub use id::{IdGenerator, TimestampIdGenerator};
pub use message::{ContentPart, ContentPartKind, Message, MessageContent, MessageKind};
pub use model::{RecencyGroup, Room, RoomSnapshot, RoomUpdate, SNAPSHOT_VERSION, derive_title};
pub use repository::RoomRepository;
pub use store::RoomStore;
