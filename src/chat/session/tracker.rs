//! In-memory tracking of active conversations per (user, group) pair.

use std::fmt;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::chat::core::config::SessionConfig;
use crate::chat::core::errors::{ConfigError, ConfigResult};
use crate::chat::core::ids::{ConversationId, PlatformId};

/// Key of a tracked session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    /// Platform user.
    pub user_id: PlatformId,
    /// Platform group or channel.
    pub group_id: PlatformId,
}

impl SessionKey {
    /// Build a key from a user and a group.
    #[must_use]
    pub const fn new(user_id: PlatformId, group_id: PlatformId) -> Self {
        Self { user_id, group_id }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user_id, self.group_id)
    }
}

/// Why [`SessionTracker::resolve`] returned the identifier it did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveReason {
    /// First message from this pair.
    NewPair,
    /// Existing conversation continued.
    Continued,
    /// Caller asked for a fresh conversation.
    Forced,
    /// The turn ceiling was reached.
    CeilingReached,
    /// The previous conversation sat idle past the configured limit.
    Expired,
}

impl ResolveReason {
    /// Whether a new conversation identifier was minted.
    #[must_use]
    pub const fn is_new(self) -> bool {
        !matches!(self, Self::Continued)
    }

    /// Stable string form for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewPair => "new_pair",
            Self::Continued => "continued",
            Self::Forced => "forced",
            Self::CeilingReached => "ceiling_reached",
            Self::Expired => "expired",
        }
    }
}

/// Result of resolving a (user, group) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Conversation the incoming message belongs to.
    pub conversation_id: ConversationId,
    /// 1-based index of the incoming message within the conversation.
    pub turn: u64,
    /// How the identifier was obtained.
    pub reason: ResolveReason,
}

#[derive(Clone, Debug)]
struct SessionEntry {
    conversation_id: ConversationId,
    turn_count: u64,
    last_seen: Instant,
}

impl SessionEntry {
    fn fresh(now: Instant) -> Self {
        Self {
            conversation_id: ConversationId::new(),
            turn_count: 1,
            last_seen: now,
        }
    }
}

/// Tracks the current conversation of every active (user, group) pair.
///
/// Resolve-or-create runs under a single lock, so two concurrent first messages from
/// the same pair always end up in the same conversation. Memory is bounded by LRU
/// eviction at `capacity` and by idle expiry.
pub struct SessionTracker {
    ceiling: u64,
    reset_on_ceiling: bool,
    idle_timeout: Option<Duration>,
    sessions: Mutex<LruCache<SessionKey, SessionEntry>>,
}

impl SessionTracker {
    /// Create a tracker from session settings.
    ///
    /// # Errors
    /// Returns an error if the capacity or ceiling is zero.
    pub fn new(config: &SessionConfig) -> ConfigResult<Self> {
        let capacity = NonZeroUsize::new(config.capacity).ok_or_else(|| {
            ConfigError::Invalid("session.capacity must be > 0".to_string())
        })?;
        if config.continuous_chat_count == 0 {
            return Err(ConfigError::Invalid(
                "session.continuous_chat_count must be > 0".to_string(),
            ));
        }

        Ok(Self {
            ceiling: u64::try_from(config.continuous_chat_count).unwrap_or(u64::MAX),
            reset_on_ceiling: config.reset_on_ceiling,
            idle_timeout: (config.idle_seconds > 0)
                .then(|| Duration::from_secs(config.idle_seconds)),
            sessions: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Resolve the conversation for an incoming message.
    ///
    /// Mints a new identifier for an unknown pair, when `force_new` is set, when the
    /// stored count has reached the ceiling (if ceiling resets are enabled), or when the
    /// session has been idle too long. The replacement is always stored.
    pub async fn resolve(&self, key: &SessionKey, force_new: bool) -> Resolution {
        self.resolve_at(key, force_new, Instant::now()).await
    }

    async fn resolve_at(&self, key: &SessionKey, force_new: bool, now: Instant) -> Resolution {
        let mut sessions = self.sessions.lock().await;

        let reason = match sessions.get_mut(key) {
            None => ResolveReason::NewPair,
            Some(_) if force_new => ResolveReason::Forced,
            Some(entry) => {
                if self.is_expired(entry, now) {
                    ResolveReason::Expired
                } else if self.reset_on_ceiling && entry.turn_count >= self.ceiling {
                    ResolveReason::CeilingReached
                } else {
                    entry.turn_count += 1;
                    entry.last_seen = now;
                    debug!(
                        session = %key,
                        conversation = %entry.conversation_id,
                        turn = entry.turn_count,
                        "Continuing conversation"
                    );
                    return Resolution {
                        conversation_id: entry.conversation_id,
                        turn: entry.turn_count,
                        reason: ResolveReason::Continued,
                    };
                }
            }
        };

        let entry = SessionEntry::fresh(now);
        let resolution = Resolution {
            conversation_id: entry.conversation_id,
            turn: entry.turn_count,
            reason,
        };
        if let Some((evicted, _)) = sessions.push(key.clone(), entry) {
            if &evicted != key {
                debug!(session = %evicted, "Evicted least recently used session");
            }
        }

        info!(
            session = %key,
            conversation = %resolution.conversation_id,
            reason = reason.as_str(),
            "Started new conversation"
        );
        resolution
    }

    /// Drop sessions idle longer than the configured limit.
    ///
    /// Returns the number of sessions removed.
    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now()).await
    }

    async fn sweep_expired_at(&self, now: Instant) -> usize {
        if self.idle_timeout.is_none() {
            return 0;
        }

        let mut sessions = self.sessions.lock().await;
        let expired: Vec<SessionKey> = sessions
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            sessions.pop(key);
        }
        expired.len()
    }

    /// Forget every session.
    pub async fn clear(&self) {
        let mut sessions = self.sessions.lock().await;
        let dropped = sessions.len();
        sessions.clear();
        info!(dropped, "Cleared session tracker");
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        self.idle_timeout
            .is_some_and(|timeout| now.saturating_duration_since(entry.last_seen) >= timeout)
    }
}

#[cfg(test)]
impl SessionTracker {
    /// Current conversation of a pair, without counting a turn.
    pub(crate) async fn current(&self, key: &SessionKey) -> Option<ConversationId> {
        let sessions = self.sessions.lock().await;
        sessions.peek(key).map(|entry| entry.conversation_id)
    }

    pub(crate) async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub(crate) async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(user: &str, group: &str) -> SessionKey {
        SessionKey::new(PlatformId::new(user).unwrap(), PlatformId::new(group).unwrap())
    }

    fn tracker(ceiling: usize) -> SessionTracker {
        SessionTracker::new(&SessionConfig {
            continuous_chat_count: ceiling,
            ..SessionConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn new_pair_mints_then_reuses() {
        let tracker = tracker(5);
        let k = key("u1", "g1");

        let first = tracker.resolve(&k, false).await;
        assert_eq!(first.reason, ResolveReason::NewPair);
        assert_eq!(first.turn, 1);

        let second = tracker.resolve(&k, false).await;
        assert_eq!(second.reason, ResolveReason::Continued);
        assert_eq!(second.conversation_id, first.conversation_id);
        assert_eq!(second.turn, 2);
        assert_eq!(tracker.len().await, 1);
    }

    #[tokio::test]
    async fn pairs_are_independent() {
        let tracker = tracker(5);
        let a = tracker.resolve(&key("u1", "g1"), false).await;
        let b = tracker.resolve(&key("u1", "g2"), false).await;
        let c = tracker.resolve(&key("u2", "g1"), false).await;

        assert_ne!(a.conversation_id, b.conversation_id);
        assert_ne!(a.conversation_id, c.conversation_id);
        assert_eq!(tracker.len().await, 3);
    }

    #[tokio::test]
    async fn ceiling_mints_new_id_and_persists_the_reset() {
        let tracker = tracker(3);
        let k = key("u1", "g1");

        let first = tracker.resolve(&k, false).await;
        for expected_turn in 2..=3 {
            let r = tracker.resolve(&k, false).await;
            assert_eq!(r.conversation_id, first.conversation_id);
            assert_eq!(r.turn, expected_turn);
        }

        let reset = tracker.resolve(&k, false).await;
        assert_eq!(reset.reason, ResolveReason::CeilingReached);
        assert_ne!(reset.conversation_id, first.conversation_id);
        assert_eq!(reset.turn, 1);

        let after = tracker.resolve(&k, false).await;
        assert_eq!(after.conversation_id, reset.conversation_id);
        assert_eq!(after.turn, 2);
        assert_eq!(tracker.current(&k).await, Some(reset.conversation_id));
    }

    #[tokio::test]
    async fn ceiling_reset_can_be_disabled() {
        let tracker = SessionTracker::new(&SessionConfig {
            continuous_chat_count: 2,
            reset_on_ceiling: false,
            ..SessionConfig::default()
        })
        .unwrap();
        let k = key("u1", "g1");

        let first = tracker.resolve(&k, false).await;
        for _ in 0..5 {
            let r = tracker.resolve(&k, false).await;
            assert_eq!(r.conversation_id, first.conversation_id);
        }
    }

    #[tokio::test]
    async fn force_new_always_mints() {
        let tracker = tracker(5);
        let k = key("u1", "g1");

        let first = tracker.resolve(&k, false).await;
        let forced = tracker.resolve(&k, true).await;
        assert_eq!(forced.reason, ResolveReason::Forced);
        assert_ne!(forced.conversation_id, first.conversation_id);
        assert_eq!(forced.turn, 1);

        let again = tracker.resolve(&k, true).await;
        assert_ne!(again.conversation_id, forced.conversation_id);

        let next = tracker.resolve(&k, false).await;
        assert_eq!(next.conversation_id, again.conversation_id);
        assert_eq!(next.turn, 2);
    }

    #[tokio::test]
    async fn force_new_on_unknown_pair_is_a_new_pair() {
        let tracker = tracker(5);
        let r = tracker.resolve(&key("u1", "g1"), true).await;
        assert_eq!(r.reason, ResolveReason::NewPair);
        assert!(r.reason.is_new());
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let tracker = SessionTracker::new(&SessionConfig {
            idle_seconds: 60,
            ..SessionConfig::default()
        })
        .unwrap();
        let k = key("u1", "g1");
        let start = Instant::now();

        let first = tracker.resolve_at(&k, false, start).await;
        let soon = tracker
            .resolve_at(&k, false, start + Duration::from_secs(30))
            .await;
        assert_eq!(soon.conversation_id, first.conversation_id);

        let late = tracker
            .resolve_at(&k, false, start + Duration::from_secs(200))
            .await;
        assert_eq!(late.reason, ResolveReason::Expired);
        assert_ne!(late.conversation_id, first.conversation_id);
    }

    #[tokio::test]
    async fn sweep_removes_only_idle_sessions() {
        let tracker = SessionTracker::new(&SessionConfig {
            idle_seconds: 60,
            ..SessionConfig::default()
        })
        .unwrap();
        let start = Instant::now();

        tracker.resolve_at(&key("old", "g"), false, start).await;
        tracker
            .resolve_at(&key("new", "g"), false, start + Duration::from_secs(100))
            .await;

        let removed = tracker
            .sweep_expired_at(start + Duration::from_secs(120))
            .await;
        assert_eq!(removed, 1);
        assert!(tracker.current(&key("old", "g")).await.is_none());
        assert!(tracker.current(&key("new", "g")).await.is_some());
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let tracker = SessionTracker::new(&SessionConfig {
            capacity: 2,
            ..SessionConfig::default()
        })
        .unwrap();

        tracker.resolve(&key("a", "g"), false).await;
        tracker.resolve(&key("b", "g"), false).await;
        tracker.resolve(&key("a", "g"), false).await;
        tracker.resolve(&key("c", "g"), false).await;

        assert_eq!(tracker.len().await, 2);
        assert!(tracker.current(&key("b", "g")).await.is_none());
        assert!(tracker.current(&key("a", "g")).await.is_some());
    }

    #[tokio::test]
    async fn concurrent_first_contact_shares_one_conversation() {
        let tracker = std::sync::Arc::new(tracker(50));
        let k = key("u1", "g1");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let tracker = std::sync::Arc::clone(&tracker);
            let k = k.clone();
            handles.push(tokio::spawn(async move { tracker.resolve(&k, false).await }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().conversation_id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(tracker.len().await, 1);
    }

    #[tokio::test]
    async fn clear_forgets_everything() {
        let tracker = tracker(5);
        tracker.resolve(&key("u1", "g1"), false).await;
        tracker.clear().await;
        assert!(tracker.is_empty().await);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = SessionTracker::new(&SessionConfig {
            capacity: 0,
            ..SessionConfig::default()
        });
        assert!(err.is_err());
    }
}
