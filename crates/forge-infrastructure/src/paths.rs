//! Unified path management for ReactForge files.
//!
//! Configuration and session data are resolved via `AppPaths` from the
//! version-migrate crate, the same resolver `AsyncDirStorage` uses.
//!
//! ```text
//! ~/.config/reactforge/        # Config directory
//! └── config.toml
//!
//! ~/.local/share/reactforge/   # Data directory
//! └── sessions/                # Session files (AsyncDirStorage)
//! ```

use forge_core::{ForgeError, Result};
use std::path::PathBuf;
use version_migrate::AppPaths;

/// Application name used for every platform directory.
pub const APP_NAME: &str = "reactforge";

pub struct ForgePaths;

impl ForgePaths {
    fn app_paths() -> AppPaths {
        AppPaths::new(APP_NAME)
    }

    /// Platform configuration directory (e.g. `~/.config/reactforge/`).
    pub fn config_dir() -> Result<PathBuf> {
        Self::app_paths()
            .config_dir()
            .map_err(|e| ForgeError::config(format!("Cannot resolve config directory: {}", e)))
    }

    /// Platform data directory (e.g. `~/.local/share/reactforge/`).
    pub fn data_dir() -> Result<PathBuf> {
        Self::app_paths()
            .data_dir()
            .map_err(|e| ForgeError::config(format!("Cannot resolve data directory: {}", e)))
    }

    /// Path of `config.toml`.
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }
}
