//! Persistence traits for profiles and conversation turns.
//!
//! These traits decouple the pipeline from the specific storage mechanism
//! (TOML/JSON files, database, remote API). The orchestrator is the only
//! component that calls them.

use async_trait::async_trait;

use crate::error::Result;
use crate::profile::UserProfile;
use crate::turn::ConversationTurn;

/// Read-only access to stored user profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Loads the profile snapshot for a user.
    ///
    /// # Returns
    ///
    /// - `Ok(profile)`: Profile found
    /// - `Err(GreencareError::NotFound)`: No profile on file for this user
    /// - `Err(_)`: Storage failure
    async fn get_profile(&self, user_id: u64) -> Result<UserProfile>;
}

/// Append/read access to the per-session conversation log.
///
/// # Implementation notes
///
/// Appends must be durable and keep chronological order within a session.
/// The orchestrator serializes same-session appends, so implementations only
/// need atomicity per call, not cross-call coordination.
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Appends a turn to its session's log.
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()>;

    /// Returns up to `limit` most recent turns for a session, oldest first.
    async fn get_recent_turns(&self, session_id: &str, limit: usize)
    -> Result<Vec<ConversationTurn>>;
}
