//! Completion bridge: history plus prompt in, reply or diagnostic out.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::messages::{ChatMessage, build_messages};
use crate::llm::openai::CompletionClient;

/// Label put in front of every failure diagnostic shown in chat.
pub const FAILURE_LABEL: &str = "internal server error: ";

/// Outcome of one completion call.
///
/// Failures are values, not errors: the caller decides whether to show, store or
/// drop them. [`CompletionOutcome::text`] renders either variant for chat display.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CompletionOutcome {
    /// The endpoint produced a reply.
    Reply(String),
    /// The call failed; `diagnostic` carries the error's message text.
    Failed {
        /// Human-readable failure description.
        diagnostic: String,
    },
}

impl CompletionOutcome {
    /// Build a failure from any displayable error.
    #[must_use]
    pub fn failed(err: &impl std::fmt::Display) -> Self {
        Self::Failed {
            diagnostic: err.to_string(),
        }
    }

    /// Whether the call failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Text to show in chat: the reply, or the labelled diagnostic.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Reply(reply) => reply.clone(),
            Self::Failed { diagnostic } => format!("{FAILURE_LABEL}{diagnostic}"),
        }
    }
}

/// Formats history into a completion request and sends it.
pub struct CompletionBridge {
    client: Arc<dyn CompletionClient>,
    system_prompt: Option<String>,
}

impl CompletionBridge {
    /// Create a bridge over a completion client.
    #[must_use]
    pub fn new(client: Arc<dyn CompletionClient>, system_prompt: Option<String>) -> Self {
        Self {
            client,
            system_prompt,
        }
    }

    /// Assemble the ordered message list for a request.
    ///
    /// The optional system prompt comes first, then the prior turns as given, then the
    /// new prompt.
    #[must_use]
    pub fn assemble<'a, I>(&self, prior: I, new_prompt: &str) -> Vec<ChatMessage>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let turns = build_messages(prior, new_prompt);
        match &self.system_prompt {
            Some(system) => {
                let mut messages = Vec::with_capacity(turns.len() + 1);
                messages.push(ChatMessage::system(system.as_str()));
                messages.extend(turns);
                messages
            }
            None => turns,
        }
    }

    /// Send prior turns plus the new prompt in one call.
    ///
    /// Never fails: endpoint and transport errors come back as
    /// [`CompletionOutcome::Failed`].
    pub async fn build_and_send<'a, I>(&self, prior: I, new_prompt: &str) -> CompletionOutcome
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let messages = self.assemble(prior, new_prompt);
        debug!(messages = messages.len(), "Assembled completion request");

        match self.client.complete(messages).await {
            Ok(reply) => CompletionOutcome::Reply(reply),
            Err(err) => {
                warn!(error = %err, transient = err.is_transient(), "Completion failed");
                CompletionOutcome::failed(&err)
            }
        }
    }
}
