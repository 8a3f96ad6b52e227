//! HTTP route handlers for the chat API.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::chat::service::ChatReply;
use crate::command::context::CommandContext;
use crate::command::parser::{ChatCommand, CommandError, USAGE};

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/command", post(run_command))
        .route("/api/chat", post(chat))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "gpt-chat",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Raw command line request.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    /// Command line, e.g. `chat -n "hello there"`.
    pub text: String,
    /// Platform context; absent when the platform has none.
    #[serde(default)]
    pub context: Option<CommandContext>,
}

/// Structured chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
    /// Start a new conversation first.
    #[serde(default)]
    pub new: bool,
    /// Platform context; absent when the platform has none.
    #[serde(default)]
    pub context: Option<CommandContext>,
}

/// Reply posted back to the chat.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyResponse {
    /// Text to display.
    pub reply: String,
    /// `answer`, `images`, `rejected`, `failed` or `usage`.
    pub kind: String,
}

impl From<ChatReply> for ReplyResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            kind: reply.kind().to_string(),
            reply: reply.text(),
        }
    }
}

/// Handle raw command lines.
async fn run_command(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> Json<ReplyResponse> {
    let reply = state
        .chat
        .handle_line(request.context.as_ref(), &request.text)
        .await;
    Json(reply.into())
}

/// Handle structured chat requests.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ReplyResponse> {
    let message = request.message.trim();
    if message.is_empty() {
        let err = CommandError::MissingArgument("msg");
        return Json(ChatReply::Usage(format!("error: {err}\n{USAGE}")).into());
    }

    let command = ChatCommand {
        message: message.to_string(),
        force_new: request.new,
    };
    let reply = state.chat.chat(request.context.as_ref(), &command).await;
    Json(reply.into())
}
