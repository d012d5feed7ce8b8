pub mod config;
pub mod rooms;
