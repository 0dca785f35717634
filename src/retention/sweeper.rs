use super::policy;
use crate::error::Result;
use crate::history::HistoryStore;
use crate::settings::SettingsStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Deletes sessions that have outlived the owner's retention threshold.
///
/// One idempotent `sweep` operation with two callers: the write path (via
/// [`WriteGuard`](crate::retention::WriteGuard), awaited before the response
/// so statistics immediately reflect the cleanup) and an optional
/// interval-driven pass that bounds staleness for inactive users. Expiry is
/// judged on the session's `created_at`: a long-lived session with recent
/// messages is still eligible once the session record itself is old enough.
pub struct RetentionSweeper {
    settings: Arc<dyn SettingsStore>,
    history: Arc<dyn HistoryStore>,
}

impl RetentionSweeper {
    pub fn new(settings: Arc<dyn SettingsStore>, history: Arc<dyn HistoryStore>) -> Self {
        Self { settings, history }
    }

    /// Remove this user's expired sessions. Returns the number deleted.
    ///
    /// Safe to run concurrently for the same user: a session another sweep
    /// already removed counts as zero here, not as an error. A pass aborted
    /// midway leaves prior deletions in place; the next write or tick
    /// retries naturally.
    pub async fn sweep(&self, user_id: &str) -> Result<u64> {
        let settings = self.settings.get(user_id).await?;
        if !settings.auto_delete_history {
            return Ok(0);
        }

        let now = Utc::now();
        let sessions = self.history.list_sessions(user_id, None).await?;

        let mut deleted = 0u64;
        for session in sessions {
            if !policy::is_expired(&settings, session.created_at, now) {
                continue;
            }
            if self.history.delete_session(user_id, &session.id).await? {
                deleted += 1;
            }
        }

        if deleted > 0 {
            tracing::info!(
                user_id = %user_id,
                deleted,
                threshold_days = settings.auto_delete_days,
                "retention sweep removed expired sessions"
            );
        }
        Ok(deleted)
    }

    /// The clear-history action: delete every session the user owns,
    /// regardless of policy.
    pub async fn purge_all(&self, user_id: &str) -> Result<u64> {
        let deleted = self.history.delete_all_sessions(user_id).await?;
        tracing::info!(user_id = %user_id, deleted, "cleared all chat history");
        Ok(deleted)
    }

    /// Sweep every user that currently owns sessions.
    pub async fn sweep_all(&self) -> Result<u64> {
        let owners = self.history.session_owners().await?;
        let mut total = 0u64;
        for user_id in owners {
            match self.sweep(&user_id).await {
                Ok(deleted) => total += deleted,
                Err(error) => {
                    tracing::warn!(user_id = %user_id, error = %error, "per-user sweep failed");
                }
            }
        }
        Ok(total)
    }

    /// Timer-driven pass, independent of request traffic. Runs until the
    /// task is dropped.
    pub async fn run_interval(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.sweep_all().await {
                Ok(0) => {}
                Ok(deleted) => tracing::debug!(deleted, "interval sweep finished"),
                Err(error) => tracing::warn!(error = %error, "interval sweep failed"),
            }
        }
    }
}
