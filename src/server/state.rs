//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::chat::core::config::ChatConfig;
use crate::chat::service::{ChatService, StartupError};

/// Shared application state.
pub struct AppState {
    /// Chat command handler.
    pub chat: ChatService,
}

impl AppState {
    /// Wrap an existing chat service.
    #[must_use]
    pub fn new(chat: ChatService) -> Arc<Self> {
        Arc::new(Self { chat })
    }

    /// Build state from configuration.
    ///
    /// # Errors
    /// Returns an error if the history store or the endpoint client cannot be set up.
    pub async fn from_config(config: ChatConfig) -> Result<Arc<Self>, StartupError> {
        let chat = ChatService::from_config(config).await?;
        Ok(Self::new(chat))
    }
}
