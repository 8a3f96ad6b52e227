//! Core chat types: configuration, errors and identifiers.

pub mod config;
pub mod errors;
pub mod ids;

pub use config::{ApiConfig, ChatConfig, ENV_PREFIX, SessionConfig, StorageConfig};
pub use errors::{ConfigError, ConfigResult, StoreError, StoreResult};
pub use ids::{BlankIdError, ConversationId, ModelId, ModelIdError, PlatformId};
