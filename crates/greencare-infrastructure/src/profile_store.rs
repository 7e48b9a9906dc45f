//! TOML-backed profile store.
//!
//! One file per user under `profiles/`. The pipeline only reads profiles;
//! edits belong to the surrounding application.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use greencare_core::error::{GreencareError, Result};
use greencare_core::profile::UserProfile;
use greencare_core::repository::ProfileStore;

/// Directory layout:
///
/// ```text
/// base_dir/
/// └── profiles/
///     ├── 1.toml
///     └── 2.toml
/// ```
pub struct TomlProfileStore {
    profiles_dir: PathBuf,
}

impl TomlProfileStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let profiles_dir = base_dir.as_ref().join("profiles");
        std::fs::create_dir_all(&profiles_dir)?;
        Ok(Self { profiles_dir })
    }

    fn profile_path(&self, user_id: u64) -> PathBuf {
        self.profiles_dir.join(format!("{user_id}.toml"))
    }
}

#[async_trait]
impl ProfileStore for TomlProfileStore {
    async fn get_profile(&self, user_id: u64) -> Result<UserProfile> {
        let path = self.profile_path(user_id);
        if !path.exists() {
            return Err(GreencareError::not_found("user_profile", user_id.to_string()));
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        let profile = toml::from_str(&raw)?;
        Ok(profile)
    }
}
