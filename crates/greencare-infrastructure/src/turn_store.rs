//! JSON-backed conversation log.
//!
//! One file per session under `sessions/`. Appends are read-modify-write with
//! a tmp file and atomic rename, so a crash never leaves a half-written log.
//! The orchestrator serializes same-session appends, so no file locking is
//! needed beyond the rename.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use greencare_core::error::Result;
use greencare_core::repository::TurnStore;
use greencare_core::turn::ConversationTurn;

/// Directory layout:
///
/// ```text
/// base_dir/
/// └── sessions/
///     ├── <session-id>.json
///     └── ...
/// ```
///
/// Session IDs are expected to be filename-safe (UUIDs in practice).
pub struct JsonTurnStore {
    sessions_dir: PathBuf,
}

impl JsonTurnStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let sessions_dir = base_dir.as_ref().join("sessions");
        std::fs::create_dir_all(&sessions_dir)?;
        Ok(Self { sessions_dir })
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.json"))
    }

    async fn load(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    async fn save(&self, session_id: &str, turns: &[ConversationTurn]) -> Result<()> {
        let path = self.session_path(session_id);
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(turns)?;
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl TurnStore for JsonTurnStore {
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()> {
        let mut turns = self.load(&turn.session_id).await?;
        turns.push(turn.clone());
        self.save(&turn.session_id, &turns).await
    }

    async fn get_recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>> {
        let turns = self.load(session_id).await?;
        let skip = turns.len().saturating_sub(limit);
        Ok(turns[skip..].to_vec())
    }
}
