pub mod config_service;
pub mod file_room_repository;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::file_room_repository::FileRoomRepository;
pub use crate::paths::DelvePaths;
