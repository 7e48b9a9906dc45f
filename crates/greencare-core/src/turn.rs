//! Conversation turn types.
//!
//! A turn is one persisted message (user or assistant) in a session.
//! Turns are append-only: once written they are never edited, and they are
//! only read back to build the context for later requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents the role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum TurnRole {
    /// Message from the user.
    User,
    /// Message from the advisory pipeline.
    Assistant,
}

/// The specialist domain a piece of content came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum AgentKind {
    Health,
    Financial,
}

/// A single persisted message in a conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Session the turn belongs to.
    pub session_id: String,
    /// Owning user.
    pub user_id: u64,
    /// Who authored the turn.
    pub role: TurnRole,
    /// Pipeline tag for assistant turns ("Orchestrator" in practice);
    /// `None` for user turns.
    #[serde(default)]
    pub agent_type: Option<String>,
    /// The message content.
    pub content: String,
    /// Creation timestamp.
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Creates a user turn stamped with the current time.
    pub fn user(session_id: impl Into<String>, user_id: u64, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
            role: TurnRole::User,
            agent_type: None,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates an assistant turn attributed to the orchestrator.
    pub fn assistant(
        session_id: impl Into<String>,
        user_id: u64,
        content: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
            role: TurnRole::Assistant,
            agent_type: Some("Orchestrator".to_string()),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}
