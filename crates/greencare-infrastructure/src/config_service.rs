//! Configuration loading.
//!
//! Reads `config.toml` from the GreenCare config directory. A missing file
//! yields the built-in defaults; a malformed file is an error rather than a
//! silent fallback.

use std::path::Path;

use greencare_core::config::GreencareConfig;
use greencare_core::error::Result;
use tracing::debug;

use crate::paths::GreencarePaths;

/// Loads configuration from the default location.
pub fn load_default() -> Result<GreencareConfig> {
    load_from(&GreencarePaths::config_file()?)
}

/// Loads configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<GreencareConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(GreencareConfig::default());
    }
    let raw = std::fs::read_to_string(path)?;
    let config = toml::from_str(&raw)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.pipeline.history_limit, 10);
    }

    #[test]
    fn file_overrides_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [gateway]
            base_url = "http://ark.internal:8080/v1"

            [pipeline]
            max_regenerations = 2
            "#,
        )
        .unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.gateway.base_url, "http://ark.internal:8080/v1");
        assert_eq!(config.pipeline.max_regenerations, 2);
        assert_eq!(config.pipeline.history_limit, 10);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "pipeline = 3").unwrap();
        assert!(load_from(&path).is_err());
    }
}
