//! Background worker that drops idle sessions from the tracker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::chat::session::tracker::SessionTracker;

/// Longest pause between two sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Periodically removes idle sessions until shut down.
pub struct SessionSweeper {
    tracker: Arc<SessionTracker>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl SessionSweeper {
    /// Create a sweeper for the given idle limit.
    ///
    /// Sweeps run every `idle_seconds`, capped at five minutes. Returns `None` when
    /// `idle_seconds` is zero, since sessions never expire then.
    #[must_use]
    pub fn new(tracker: Arc<SessionTracker>, idle_seconds: u64) -> Option<Self> {
        if idle_seconds == 0 {
            return None;
        }
        Some(Self {
            tracker,
            interval: Duration::from_secs(idle_seconds).min(MAX_SWEEP_INTERVAL),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Get a shutdown notifier to stop the sweeper.
    #[must_use]
    pub fn shutdown_notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Spawn the sweeper as a tokio task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        info!(interval = ?self.interval, "Starting session sweeper");

        loop {
            tokio::select! {
                () = tokio::time::sleep(self.interval) => {
                    let removed = self.tracker.sweep_expired().await;
                    if removed > 0 {
                        info!(removed, "Dropped idle sessions");
                    } else {
                        debug!("Session sweep found nothing to drop");
                    }
                }
                () = self.shutdown.notified() => {
                    info!("Session sweeper shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::core::config::SessionConfig;

    #[tokio::test]
    async fn stops_on_shutdown() {
        let tracker = Arc::new(SessionTracker::new(&SessionConfig::default()).unwrap());
        let sweeper = SessionSweeper::new(tracker, 3600).unwrap();
        let shutdown = sweeper.shutdown_notifier();
        let handle = sweeper.spawn();

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn interval_is_capped() {
        let tracker = Arc::new(SessionTracker::new(&SessionConfig::default()).unwrap());
        assert_eq!(
            SessionSweeper::new(Arc::clone(&tracker), 3600)
                .unwrap()
                .interval,
            MAX_SWEEP_INTERVAL
        );
        assert_eq!(
            SessionSweeper::new(tracker, 30).unwrap().interval,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn not_created_when_expiry_is_off() {
        let tracker = Arc::new(SessionTracker::new(&SessionConfig::default()).unwrap());
        assert!(SessionSweeper::new(tracker, 0).is_none());
    }
}
