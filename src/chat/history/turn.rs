//! Persisted chat turn model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::core::ids::{ConversationId, PlatformId};

/// A completed exchange as stored in the history table.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Auto-assigned row id.
    pub id: i64,
    /// Conversation the turn belongs to.
    pub conversation_id: ConversationId,
    /// Platform user.
    pub user_id: PlatformId,
    /// Platform group.
    pub group_id: PlatformId,
    /// User prompt.
    pub message: String,
    /// Assistant reply (or stored failure diagnostic).
    pub answer: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    /// The (prompt, reply) pair replayed as context.
    #[must_use]
    pub fn exchange(&self) -> (&str, &str) {
        (&self.message, &self.answer)
    }
}

/// A turn about to be appended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewChatTurn {
    /// Conversation the turn belongs to.
    pub conversation_id: ConversationId,
    /// Platform user.
    pub user_id: PlatformId,
    /// Platform group.
    pub group_id: PlatformId,
    /// User prompt.
    pub message: String,
    /// Assistant reply.
    pub answer: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
