//! Startup helpers for the chat server.

use std::process::ExitCode;
use std::sync::Arc;

use crate::chat::core::config::{ChatConfig, ENV_PREFIX};
use crate::chat::session::sweeper::SessionSweeper;
use crate::server::{self, AppState};

/// Run the server until Ctrl-C (used by the `gpt-chat-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();

    tracing::info!("Starting gpt-chat v{}", env!("CARGO_PKG_VERSION"));

    let config = match ChatConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };
    tracing::info!(
        endpoint = %config.api.base_url,
        model = %config.api.model,
        proxy = config.api.proxy.is_some(),
        "Completion endpoint configured"
    );

    let port = get_port();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(serve(config, port)) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Install the global `tracing` subscriber, honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();
}

/// Serve the chat API until Ctrl-C, then stop the sweeper and forget all sessions.
///
/// # Errors
/// Returns an error if state setup or the server fails.
pub async fn serve(
    config: ChatConfig,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = AppState::from_config(config).await?;

    let idle_seconds = state.chat.config().session.idle_seconds;
    let sweeper = SessionSweeper::new(Arc::clone(state.chat.tracker()), idle_seconds)
        .map(|sweeper| (sweeper.shutdown_notifier(), sweeper.spawn()));
    if sweeper.is_none() {
        tracing::info!("Session expiry disabled, sweeper not started");
    }

    let result =
        server::run_server_with_shutdown(Arc::clone(&state), port, shutdown_signal()).await;

    if let Some((stop_sweeper, sweeper_handle)) = sweeper {
        stop_sweeper.notify_one();
        if let Err(e) = sweeper_handle.await {
            tracing::warn!("Session sweeper ended abnormally: {e}");
        }
    }
    state.chat.shutdown().await;
    tracing::info!("Sessions cleared, shutdown complete");

    result
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl-C received, shutting down"),
        Err(e) => tracing::error!("Failed to listen for Ctrl-C: {e}"),
    }
}

/// Get configured server port from `GPT_CHAT_PORT`.
#[must_use]
pub fn get_port() -> u16 {
    std::env::var(format!("{ENV_PREFIX}PORT"))
        .ok()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(server::DEFAULT_PORT)
}
