//! Remote language-model access.
//!
//! - `messages`: chat message model and request assembly
//! - `openai`: HTTP client for OpenAI-compatible endpoints
//! - `bridge`: history-to-request formatting with failure-as-value outcomes
//! - `error`: client error type

pub mod bridge;
pub mod error;
pub mod messages;
pub mod openai;

pub use bridge::{CompletionBridge, CompletionOutcome, FAILURE_LABEL};
pub use error::CompletionError;
pub use messages::{ChatMessage, ChatRole, build_messages};
pub use openai::{CompletionClient, CompletionFuture, ImageGenerator, OpenAiClient};
