//! Persisted session settings

use crate::core::codec::{EncodingMode, NewlineMode};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Session settings
///
/// Both modes may be changed mid-session; changes take effect on the next
/// send or receive and never rewrite already-rendered log text.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Line ending appended to outbound sends
    pub newline: NewlineMode,
    /// Text or hex interpretation of sends and display of receives
    pub encoding: EncodingMode,
    /// Send final dictation results immediately instead of staging them
    pub auto_submit_dictation: bool,
}

impl SessionSettings {
    /// Load settings from the default config location
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = super::config_dir()
            .ok_or("could not determine config directory")?
            .join("settings.toml");

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings to the default config location
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = super::config_dir()
            .ok_or("could not determine config directory")?
            .join("settings.toml");
        self.save_to(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save settings to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SessionSettings::default();
        assert_eq!(settings.newline, NewlineMode::CrLf);
        assert_eq!(settings.encoding, EncodingMode::Text);
        assert!(!settings.auto_submit_dictation);
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let settings = SessionSettings {
            newline: NewlineMode::Lf,
            encoding: EncodingMode::Hex,
            auto_submit_dictation: true,
        };
        settings.save_to(&path).unwrap();

        let loaded = SessionSettings::load_from(&path).unwrap();
        assert_eq!(loaded.newline, NewlineMode::Lf);
        assert_eq!(loaded.encoding, EncodingMode::Hex);
        assert!(loaded.auto_submit_dictation);
    }

    #[test]
    fn test_missing_file_is_an_error_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SessionSettings::load_from(&dir.path().join("nope.toml")).is_err());
    }
}
