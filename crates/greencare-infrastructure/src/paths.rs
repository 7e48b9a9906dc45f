//! Standard filesystem locations for GreenCare data.

use std::path::PathBuf;

use greencare_core::error::{GreencareError, Result};

/// Resolves the directories GreenCare reads and writes.
pub struct GreencarePaths;

impl GreencarePaths {
    /// Configuration directory (`~/.config/greencare` on Linux).
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("greencare"))
            .ok_or_else(|| GreencareError::config("could not determine config directory"))
    }

    /// Default configuration file path.
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Data directory for profiles and conversation logs
    /// (`~/.local/share/greencare` on Linux).
    pub fn data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join("greencare"))
            .ok_or_else(|| GreencareError::config("could not determine data directory"))
    }
}
