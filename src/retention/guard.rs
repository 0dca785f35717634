use super::policy;
use super::sweeper::RetentionSweeper;
use crate::error::{HistoryError, Result};
use crate::history::{ChatMessage, ChatSession, HistoryStore, MessageRole};
use crate::settings::SettingsStore;
use std::sync::Arc;

/// The write-path guard. Every mutating operation on chat data goes through
/// here: the user's current settings are loaded, the policy is checked, the
/// store delegate runs, and an opportunistic sweep of the same user's stale
/// data is awaited before the result is returned.
///
/// The settings are resolved per call; there is no cached or shared
/// decision state, so a policy change takes effect with the user's very
/// next write.
pub struct WriteGuard {
    settings: Arc<dyn SettingsStore>,
    history: Arc<dyn HistoryStore>,
    sweeper: Arc<RetentionSweeper>,
}

impl WriteGuard {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        history: Arc<dyn HistoryStore>,
        sweeper: Arc<RetentionSweeper>,
    ) -> Self {
        Self {
            settings,
            history,
            sweeper,
        }
    }

    /// Create a session, subject to the user's retention policy.
    pub async fn create_session(&self, user_id: &str, title: &str) -> Result<ChatSession> {
        let settings = self.settings.get(user_id).await?;
        if !policy::can_persist(&settings) {
            return Err(HistoryError::HistoryDisabled.into());
        }

        let session = self.history.create_session(user_id, title).await?;
        self.sweep_after_write(user_id).await;
        Ok(session)
    }

    /// Append a message to one of the user's sessions, subject to the
    /// user's retention policy. Refreshes the session's `updated_at`.
    pub async fn append_message(
        &self,
        user_id: &str,
        session_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ChatMessage> {
        let settings = self.settings.get(user_id).await?;
        if !policy::can_persist(&settings) {
            return Err(HistoryError::HistoryDisabled.into());
        }

        let message = self
            .history
            .append_message(user_id, session_id, role, content)
            .await?;
        self.sweep_after_write(user_id).await;
        Ok(message)
    }

    /// Cleanup is best-effort: a failed sweep is logged and the write that
    /// triggered it still succeeds.
    async fn sweep_after_write(&self, user_id: &str) {
        if let Err(error) = self.sweeper.sweep(user_id).await {
            tracing::warn!(user_id = %user_id, error = %error, "post-write retention sweep failed");
        }
    }
}
