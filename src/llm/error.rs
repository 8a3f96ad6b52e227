//! Error types for the completion endpoint client.

use thiserror::Error;

/// Errors that can occur while talking to the completion endpoint.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// HTTP request failed (connect, timeout, body decode).
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status.
    #[error("endpoint returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Response carried no choice to read the reply from.
    #[error("endpoint returned no choices")]
    NoChoices,

    /// Response carried no generated image.
    #[error("endpoint returned no images")]
    NoImages,

    /// HTTP client configuration error.
    #[error("HTTP client error: {0}")]
    Config(String),
}

impl CompletionError {
    /// Check if this error is likely transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpRequest(err) => err.is_timeout() || err.is_connect(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
