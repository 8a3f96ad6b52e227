//! Persisted chat history.

pub mod store;
pub mod turn;

pub use store::{ChatStore, SqliteChatStore, StoreFuture};
pub use turn::{ChatTurn, NewChatTurn};
