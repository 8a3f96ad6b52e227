//! Chat command handling: session resolution, history replay, completion, persistence.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::{ConfigError, StoreError};
use crate::chat::core::ids::PlatformId;
use crate::chat::history::store::{ChatStore, SqliteChatStore};
use crate::chat::history::turn::{ChatTurn, NewChatTurn};
use crate::chat::session::tracker::{SessionKey, SessionTracker};
use crate::command::context::CommandContext;
use crate::command::parser::{ChatCommand, Command, USAGE, parse_command};
use crate::llm::bridge::{CompletionBridge, CompletionOutcome, FAILURE_LABEL};
use crate::llm::error::CompletionError;
use crate::llm::openai::{CompletionClient, ImageGenerator, OpenAiClient};

/// Reply when the platform supplied no context at all.
pub const NO_CONTEXT_REPLY: &str = "error: session is null";
/// Reply when a command arrives as a direct message.
pub const DIRECT_MESSAGE_REPLY: &str = "warn: this command is only available in group chats";
/// Reply when the sender or group identifier is missing.
pub const MISSING_IDS_REPLY: &str = "error: userId | channelId is nil";

/// Errors raised while wiring the service at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// History store could not be opened.
    #[error("history store: {0}")]
    Store(#[from] StoreError),
    /// HTTP client could not be built.
    #[error("completion client: {0}")]
    Client(#[from] CompletionError),
}

/// What a command produced for the chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatReply {
    /// Model reply.
    Answer(String),
    /// Generated image URLs.
    Images(Vec<String>),
    /// Command refused before doing any work.
    Rejected(String),
    /// Work started but failed; carries the labelled diagnostic.
    Failed(String),
    /// Usage text.
    Usage(String),
}

impl ChatReply {
    /// Text to post back into the chat.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Answer(text) | Self::Rejected(text) | Self::Failed(text) | Self::Usage(text) => {
                text.clone()
            }
            Self::Images(urls) => urls.join("\n"),
        }
    }

    /// Stable kind tag for API responses.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Answer(_) => "answer",
            Self::Images(_) => "images",
            Self::Rejected(_) => "rejected",
            Self::Failed(_) => "failed",
            Self::Usage(_) => "usage",
        }
    }
}

/// Backend dependencies for the chat service.
pub struct ChatBackends {
    /// History store implementation.
    pub store: Arc<dyn ChatStore>,
    /// Completion client implementation.
    pub completion: Arc<dyn CompletionClient>,
    /// Image generator implementation.
    pub images: Arc<dyn ImageGenerator>,
}

impl ChatBackends {
    /// Build the `SQLite` store and the HTTP endpoint client from config.
    ///
    /// # Errors
    /// Returns an error if the store cannot be opened or the client cannot be built.
    pub async fn from_config(config: &ChatConfig) -> Result<Self, StartupError> {
        let store = Arc::new(SqliteChatStore::new(&config.storage).await?);
        let client = Arc::new(OpenAiClient::new(&config.api)?);

        Ok(Self {
            store,
            completion: Arc::clone(&client) as Arc<dyn CompletionClient>,
            images: client,
        })
    }
}

/// Handles chat commands end to end.
///
/// Turns from the same (user, group) pair run one at a time; different pairs run
/// concurrently.
pub struct ChatService {
    config: ChatConfig,
    tracker: Arc<SessionTracker>,
    store: Arc<dyn ChatStore>,
    bridge: CompletionBridge,
    images: Arc<dyn ImageGenerator>,
    turn_locks: DashMap<SessionKey, Arc<Mutex<()>>>,
}

impl ChatService {
    /// Create a service over explicit backends.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ChatConfig, backends: ChatBackends) -> Result<Self, StartupError> {
        config.validate()?;
        let tracker = Arc::new(SessionTracker::new(&config.session)?);
        let bridge = CompletionBridge::new(backends.completion, config.api.system_prompt.clone());

        Ok(Self {
            config,
            tracker,
            store: backends.store,
            bridge,
            images: backends.images,
            turn_locks: DashMap::new(),
        })
    }

    /// Create a service with `SQLite` history and the HTTP endpoint client.
    ///
    /// # Errors
    /// Returns an error if configuration or backends are invalid.
    pub async fn from_config(config: ChatConfig) -> Result<Self, StartupError> {
        let backends = ChatBackends::from_config(&config).await?;
        Self::new(config, backends)
    }

    /// Session tracker owned by this service.
    #[must_use]
    pub const fn tracker(&self) -> &Arc<SessionTracker> {
        &self.tracker
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Parse and run a raw command line.
    pub async fn handle_line(&self, context: Option<&CommandContext>, line: &str) -> ChatReply {
        match parse_command(line) {
            Ok(Command::Chat(command)) => self.chat(context, &command).await,
            Ok(Command::Image { prompt }) => self.image(context, &prompt).await,
            Ok(Command::Help) => ChatReply::Usage(USAGE.to_string()),
            Err(err) => ChatReply::Usage(format!("error: {err}\n{USAGE}")),
        }
    }

    /// Run one chat turn.
    pub async fn chat(&self, context: Option<&CommandContext>, command: &ChatCommand) -> ChatReply {
        let (key, context) = match Self::session_key(context) {
            Ok(found) => found,
            Err(reply) => return reply,
        };

        let lock = Arc::clone(&self.turn_locks.entry(key.clone()).or_default());
        let guard = lock.lock().await;
        let reply = self.run_turn(&key, context, command).await;
        drop(guard);
        drop(lock);
        self.turn_locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);

        reply
    }

    async fn run_turn(
        &self,
        key: &SessionKey,
        context: &CommandContext,
        command: &ChatCommand,
    ) -> ChatReply {
        let resolution = self.tracker.resolve(key, command.force_new).await;

        let history = match self
            .store
            .recent(
                resolution.conversation_id,
                key.user_id.clone(),
                key.group_id.clone(),
                self.config.session.continuous_chat_count,
            )
            .await
        {
            Ok(history) => history,
            Err(err) => {
                warn!(session = %key, error = %err, "History lookup failed");
                return ChatReply::Failed(format!("{FAILURE_LABEL}{err}"));
            }
        };

        info!(
            session = %key,
            conversation = %resolution.conversation_id,
            turn = resolution.turn,
            replayed = history.len(),
            "Sending chat turn"
        );

        let outcome = self
            .bridge
            .build_and_send(history.iter().map(ChatTurn::exchange), &command.message)
            .await;

        if !outcome.is_failure() || self.config.persist_failures {
            let turn = NewChatTurn {
                conversation_id: resolution.conversation_id,
                user_id: key.user_id.clone(),
                group_id: key.group_id.clone(),
                message: command.message.clone(),
                answer: outcome.text(),
                created_at: context.received_at(),
            };
            if let Err(err) = self.store.append(turn).await {
                warn!(session = %key, error = %err, "Failed to persist chat turn");
            }
        }

        match outcome {
            CompletionOutcome::Reply(reply) => ChatReply::Answer(reply),
            failed @ CompletionOutcome::Failed { .. } => ChatReply::Failed(failed.text()),
        }
    }

    /// Generate images for a prompt. Sessions and history are not touched.
    pub async fn image(&self, context: Option<&CommandContext>, prompt: &str) -> ChatReply {
        if let Err(reply) = Self::session_key(context) {
            return reply;
        }

        match self.images.generate_images(prompt.to_string()).await {
            Ok(urls) => ChatReply::Images(urls),
            Err(err) => {
                warn!(error = %err, "Image generation failed");
                ChatReply::Failed(format!("{FAILURE_LABEL}{err}"))
            }
        }
    }

    /// Forget all sessions. Persisted history is kept.
    pub async fn shutdown(&self) {
        self.tracker.clear().await;
        self.turn_locks.clear();
    }

    fn session_key(
        context: Option<&CommandContext>,
    ) -> Result<(SessionKey, &CommandContext), ChatReply> {
        let context = context.ok_or_else(|| ChatReply::Rejected(NO_CONTEXT_REPLY.to_string()))?;
        if context.is_direct {
            return Err(ChatReply::Rejected(DIRECT_MESSAGE_REPLY.to_string()));
        }

        let user_id = context.user_id.clone().and_then(|id| PlatformId::new(id).ok());
        let group_id = context.group_id.clone().and_then(|id| PlatformId::new(id).ok());
        match (user_id, group_id) {
            (Some(user_id), Some(group_id)) => Ok((SessionKey::new(user_id, group_id), context)),
            _ => Err(ChatReply::Rejected(MISSING_IDS_REPLY.to_string())),
        }
    }
}
