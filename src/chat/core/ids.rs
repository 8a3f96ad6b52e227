// File: src/chat/core/ids.rs

//! Identifier types for the chat bridge.
//!
//! Three kinds of identifiers flow through the bridge:
//! - [`ConversationId`]: opaque token minted by the session tracker, stored with
//!   every persisted turn.
//! - [`PlatformId`]: user and group identifiers handed over by the chat platform.
//!   They are opaque strings; the only rule is that they are not blank.
//! - [`ModelId`]: name of the remote completion model.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a conversation (a contiguous run of turns for one user in one group).
///
/// Always random (`UUIDv4`) so tokens never leak timing information into chat logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ConversationId(pub Uuid);

impl Default for ConversationId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationId {
    /// Mint a new random identifier.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[inline]
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Borrow the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ConversationId {
    #[inline]
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for ConversationId {
    type Err = uuid::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ===== Platform identifiers ================================================

/// Error returned when a platform identifier is blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlankIdError;

impl fmt::Display for BlankIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("platform id is blank")
    }
}

impl std::error::Error for BlankIdError {}

/// User or group identifier supplied by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformId(String);

impl PlatformId {
    /// Build a platform identifier, rejecting blank input.
    ///
    /// # Errors
    /// Returns `BlankIdError` if the input is empty after trimming.
    pub fn new(raw: impl Into<String>) -> Result<Self, BlankIdError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(BlankIdError);
        }
        Ok(Self(raw))
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PlatformId {
    type Error = BlankIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PlatformId> for String {
    fn from(value: PlatformId) -> Self {
        value.0
    }
}

// ===== Model identifier ====================================================

/// Errors that can occur when constructing a [`ModelId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelIdError {
    /// Empty after trimming.
    Empty,
    /// Exceeds [`ModelId::MAX_LEN`].
    TooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length.
        got: usize,
    },
    /// Contains a character outside the accepted set.
    InvalidChar {
        /// Offending character.
        ch: char,
        /// Character index.
        index: usize,
    },
}

impl fmt::Display for ModelIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("model id is empty"),
            Self::TooLong { max, got } => write!(f, "model id too long: got {got}, max {max}"),
            Self::InvalidChar { ch, index } => {
                write!(
                    f,
                    "model id contains invalid character {ch:?} at index {index}"
                )
            }
        }
    }
}

impl std::error::Error for ModelIdError {}

/// Name of the remote completion model, e.g. `gpt-3.5-turbo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId(String);

impl Default for ModelId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl ModelId {
    /// Hard ceiling to prevent pathological payloads.
    pub const MAX_LEN: usize = 192;

    /// Model used when none is configured.
    pub const DEFAULT: &'static str = "gpt-3.5-turbo";

    /// Build a validated `ModelId`.
    ///
    /// Accepts a conservative ASCII set: `[A-Za-z0-9._:/+-@]`.
    ///
    /// # Errors
    /// Returns `ModelIdError` if the input is empty, too long, or contains invalid characters.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ModelIdError> {
        let s = raw.as_ref().trim();

        if s.is_empty() {
            return Err(ModelIdError::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(ModelIdError::TooLong {
                max: Self::MAX_LEN,
                got: s.len(),
            });
        }

        for (i, ch) in s.chars().enumerate() {
            let ok =
                ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | ':' | '/' | '-' | '+' | '@');
            if !ok {
                return Err(ModelIdError::InvalidChar { ch, index: i });
            }
        }

        Ok(Self(s.to_owned()))
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ModelId {
    type Error = ModelIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModelId> for String {
    fn from(value: ModelId) -> Self {
        value.0
    }
}

// ===== Rusqlite integration ================================================

mod rusqlite_impl {
    use super::{ConversationId, PlatformId};

    use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

    impl ToSql for ConversationId {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            // Stored as TEXT so the `sessionId` column stays human-readable.
            Ok(ToSqlOutput::from(self.0.to_string()))
        }
    }

    impl FromSql for ConversationId {
        fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
            let text = value.as_str()?;
            text.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
        }
    }

    impl ToSql for PlatformId {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            Ok(ToSqlOutput::from(self.as_str()))
        }
    }

    impl FromSql for PlatformId {
        fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
            let text = value.as_str()?;
            Self::new(text).map_err(|e| FromSqlError::Other(Box::new(e)))
        }
    }
}
