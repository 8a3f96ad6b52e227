//! Chat-completion message model and request assembly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a chat-completion message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

impl ChatRole {
    /// Stable string form used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the ordered message list sent to the completion endpoint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Build an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Flatten prior exchanges plus the new prompt into an ordered message list.
///
/// Every `(prompt, reply)` pair becomes a user entry followed by an assistant entry,
/// in the order given. The new prompt is appended last. Nothing is reordered.
#[must_use]
pub fn build_messages<'a, I>(prior: I, new_prompt: &str) -> Vec<ChatMessage>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let prior = prior.into_iter();
    let mut messages = Vec::with_capacity(prior.size_hint().0 * 2 + 1);
    for (prompt, reply) in prior {
        messages.push(ChatMessage::user(prompt));
        messages.push(ChatMessage::assistant(reply));
    }
    messages.push(ChatMessage::user(new_prompt));
    messages
}
