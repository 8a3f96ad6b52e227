//! Configuration for the chat bridge.
//!
//! Settings come from `GPT_CHAT_*` environment variables (see [`ChatConfig::from_env`]).
//! Everything except the API key and base URL has a default.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::errors::{ConfigError, ConfigResult};
use crate::chat::core::ids::ModelId;

/// Prefix shared by every environment variable the bridge reads.
pub const ENV_PREFIX: &str = "GPT_CHAT_";

/// Top-level configuration for the chat bridge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Completion endpoint settings.
    pub api: ApiConfig,
    /// Session tracking settings.
    pub session: SessionConfig,
    /// History storage settings.
    pub storage: StorageConfig,
    /// Store failure diagnostics as the answer of a turn.
    pub persist_failures: bool,
}

impl ChatConfig {
    /// Build a configuration with the two required settings and defaults elsewhere.
    #[must_use]
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig::new(api_key, base_url),
            session: SessionConfig::default(),
            storage: StorageConfig::default(),
            persist_failures: false,
        }
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a required variable is missing, a value does not parse,
    /// or the result fails [`ChatConfig::validate`].
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// The lookup receives full variable names, [`ENV_PREFIX`] included.
    /// Empty values count as unset.
    ///
    /// # Errors
    /// Same as [`ChatConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|value| !value.trim().is_empty())
        };

        let api_key = get("API_KEY").ok_or(ConfigError::Missing("API_KEY"))?;
        let base_url = get("BASE_URL").ok_or(ConfigError::Missing("BASE_URL"))?;
        let mut config = Self::new(api_key, base_url);

        config.api.proxy = get("PROXY");
        config.api.system_prompt = get("SYSTEM_PROMPT");
        if let Some(model) = get("MODEL") {
            config.api.model = ModelId::new(&model)
                .map_err(|err| ConfigError::Invalid(format!("MODEL: {err}")))?;
        }
        if let Some(value) = get("REQUEST_TIMEOUT_SECONDS") {
            config.api.request_timeout_seconds = parse_setting("REQUEST_TIMEOUT_SECONDS", &value)?;
        }
        if let Some(value) = get("CONTINUOUS_CHAT_COUNT") {
            config.session.continuous_chat_count =
                parse_setting("CONTINUOUS_CHAT_COUNT", &value)?;
        }
        if let Some(value) = get("RESET_ON_CEILING") {
            config.session.reset_on_ceiling = parse_setting("RESET_ON_CEILING", &value)?;
        }
        if let Some(value) = get("SESSION_CAPACITY") {
            config.session.capacity = parse_setting("SESSION_CAPACITY", &value)?;
        }
        if let Some(value) = get("SESSION_IDLE_SECONDS") {
            config.session.idle_seconds = parse_setting("SESSION_IDLE_SECONDS", &value)?;
        }
        if let Some(value) = get("SQLITE_PATH") {
            config.storage.sqlite_path = PathBuf::from(value);
        }
        if let Some(value) = get("PERSIST_FAILURES") {
            config.persist_failures = parse_setting("PERSIST_FAILURES", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.api.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("API_KEY"));
        }

        Url::parse(&self.api.base_url)?;

        if let Some(proxy) = &self.api.proxy {
            Url::parse(proxy)?;
        }

        if self.api.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "api.request_timeout_seconds must be > 0".to_string(),
            ));
        }

        if self.session.continuous_chat_count == 0 {
            return Err(ConfigError::Invalid(
                "session.continuous_chat_count must be > 0".to_string(),
            ));
        }

        if self.session.capacity == 0 {
            return Err(ConfigError::Invalid(
                "session.capacity must be > 0".to_string(),
            ));
        }

        if self.storage.table.is_empty()
            || !self
                .storage
                .table
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "storage.table must be a plain identifier, got {:?}",
                self.storage.table
            )));
        }

        Ok(())
    }
}

fn parse_setting<T>(name: &'static str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err| ConfigError::Invalid(format!("{name}: {err}")))
}

/// Completion endpoint settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bearer token for the completion endpoint.
    pub api_key: String,
    /// Base URL, e.g. `https://api.example.com/v1`.
    pub base_url: String,
    /// Optional HTTP(S) proxy, e.g. `http://127.0.0.1:7890`.
    pub proxy: Option<String>,
    /// Completion model name.
    pub model: ModelId,
    /// Optional system prompt prepended to every request.
    pub system_prompt: Option<String>,
    /// Whole-request timeout.
    pub request_timeout_seconds: u64,
}

impl ApiConfig {
    /// Build endpoint settings with default model and timeout.
    #[must_use]
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            proxy: None,
            model: ModelId::default(),
            system_prompt: None,
            request_timeout_seconds: 60,
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("proxy", &self.proxy)
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

/// Session tracking settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Turn ceiling: most prior turns replayed, and turns before a forced new conversation.
    pub continuous_chat_count: usize,
    /// Start a new conversation once the ceiling is reached.
    pub reset_on_ceiling: bool,
    /// Maximum tracked (user, group) pairs before LRU eviction.
    pub capacity: usize,
    /// Idle time after which a session resolves as new. `0` disables expiry.
    pub idle_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            continuous_chat_count: 5,
            reset_on_ceiling: true,
            capacity: 1024,
            idle_seconds: 60 * 60,
        }
    }
}

/// Storage configuration for chat history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path (`:memory:` for a private in-memory database).
    pub sqlite_path: PathBuf,
    /// History table name.
    pub table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("chat.sqlite"),
            table: "chat".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn loads_required_settings_with_defaults() {
        let config = ChatConfig::from_lookup(lookup(&[
            ("API_KEY", "sk-test"),
            ("BASE_URL", "https://api.example.com/v1"),
        ]))
        .unwrap();

        assert_eq!(config.api.api_key, "sk-test");
        assert_eq!(config.api.model.as_str(), "gpt-3.5-turbo");
        assert!(config.api.proxy.is_none());
        assert_eq!(config.session.continuous_chat_count, 5);
        assert!(config.session.reset_on_ceiling);
        assert_eq!(config.storage.table, "chat");
        assert!(!config.persist_failures);
    }

    #[test]
    fn missing_api_key_is_reported() {
        let err = ChatConfig::from_lookup(lookup(&[("BASE_URL", "https://api.example.com")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("API_KEY")));
    }

    #[test]
    fn empty_proxy_counts_as_unset() {
        let config = ChatConfig::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("BASE_URL", "https://api.example.com"),
            ("PROXY", ""),
        ]))
        .unwrap();
        assert!(config.api.proxy.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ChatConfig::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("BASE_URL", "https://api.example.com"),
            ("PROXY", "http://127.0.0.1:7890"),
            ("CONTINUOUS_CHAT_COUNT", "8"),
            ("RESET_ON_CEILING", "false"),
            ("MODEL", "gpt-4o-mini"),
            ("PERSIST_FAILURES", "true"),
        ]))
        .unwrap();
        assert_eq!(config.api.proxy.as_deref(), Some("http://127.0.0.1:7890"));
        assert_eq!(config.session.continuous_chat_count, 8);
        assert!(!config.session.reset_on_ceiling);
        assert_eq!(config.api.model.as_str(), "gpt-4o-mini");
        assert!(config.persist_failures);
    }

    #[test]
    fn rejects_bad_values() {
        let err = ChatConfig::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("BASE_URL", "https://api.example.com"),
            ("CONTINUOUS_CHAT_COUNT", "five"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CONTINUOUS_CHAT_COUNT"));

        let err = ChatConfig::from_lookup(lookup(&[("API_KEY", "k"), ("BASE_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Url(_)));

        let mut config = ChatConfig::new("k", "https://api.example.com");
        config.session.continuous_chat_count = 0;
        assert!(config.validate().is_err());

        config = ChatConfig::new("k", "https://api.example.com");
        config.storage.table = "chat; DROP TABLE chat".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_hides_api_key() {
        let config = ChatConfig::new("sk-very-secret", "https://api.example.com");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
    }
}
