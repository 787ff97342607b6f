pub mod async_dir_session_repository;
pub mod config_service;
pub mod dto;
pub mod http_session_repository;
pub mod memory_session_repository;
pub mod paths;
pub mod repository_factory;

pub use crate::async_dir_session_repository::AsyncDirSessionRepository;
pub use crate::config_service::ConfigService;
pub use crate::http_session_repository::HttpSessionRepository;
pub use crate::memory_session_repository::InMemorySessionRepository;
pub use crate::paths::ForgePaths;
pub use crate::repository_factory::create_session_repository;
