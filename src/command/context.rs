//! Platform-supplied context of an inbound command.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// What the chat platform knows about the message that carried a command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandContext {
    /// Sender identifier.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Group or channel identifier.
    #[serde(default)]
    pub group_id: Option<String>,
    /// Whether the message arrived as a direct message.
    #[serde(default)]
    pub is_direct: bool,
    /// Message time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl CommandContext {
    /// Context of a group message.
    #[must_use]
    pub fn group(user_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            group_id: Some(group_id.into()),
            is_direct: false,
            timestamp: None,
        }
    }

    /// Message time, falling back to now when absent or out of range.
    #[must_use]
    pub fn received_at(&self) -> DateTime<Utc> {
        self.timestamp
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_missing_fields() {
        let ctx: CommandContext = serde_json::from_str(r#"{"user_id": "u1"}"#).unwrap();
        assert_eq!(ctx.user_id.as_deref(), Some("u1"));
        assert!(ctx.group_id.is_none());
        assert!(!ctx.is_direct);
    }

    #[test]
    fn received_at_uses_platform_timestamp() {
        let mut ctx = CommandContext::group("u1", "g1");
        ctx.timestamp = Some(1_700_000_000_123);
        assert_eq!(ctx.received_at().timestamp_millis(), 1_700_000_000_123);
    }
}
