//! Configuration module
//!
//! Handles persisted session settings (newline convention, encoding mode,
//! dictation auto-submit).

mod settings;

pub use settings::SessionSettings;

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "blueterm", "Blueterm").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Initialize application directories
pub fn init_directories() -> std::io::Result<()> {
    if let Some(dir) = config_dir() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}
