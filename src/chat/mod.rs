//! Group chat sessions backed by a remote completion endpoint.
//!
//! - `core`: configuration, errors and identifiers
//! - `session`: per-pair conversation tracking and idle sweeping
//! - `history`: persisted turns in `SQLite`
//! - `service`: command handling end to end

pub mod core;
pub mod history;
pub mod service;
pub mod session;

pub use self::core::{ChatConfig, ConfigError, ConversationId, PlatformId, StoreError};
pub use history::{ChatStore, ChatTurn, NewChatTurn, SqliteChatStore};
pub use service::{
    ChatBackends, ChatReply, ChatService, DIRECT_MESSAGE_REPLY, MISSING_IDS_REPLY,
    NO_CONTEXT_REPLY, StartupError,
};
pub use session::{Resolution, ResolveReason, SessionKey, SessionSweeper, SessionTracker};
