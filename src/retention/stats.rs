use crate::error::Result;
use crate::history::HistoryStore;
use serde::Serialize;
use std::sync::Arc;

/// Summary of a user's currently stored corpus.
///
/// `estimated_bytes` is a heuristic (the sum of message content lengths),
/// not an exact storage size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    pub session_count: u64,
    pub message_count: u64,
    pub estimated_bytes: u64,
}

/// Read-only aggregation over the history store. Reports whatever is stored
/// at the time of the call; callers that want exact post-sweep numbers run
/// a sweep first.
pub struct StatsAggregator {
    history: Arc<dyn HistoryStore>,
}

impl StatsAggregator {
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self { history }
    }

    pub async fn compute(&self, user_id: &str) -> Result<UsageStats> {
        let sessions = self.history.list_sessions(user_id, None).await?;

        let mut stats = UsageStats {
            session_count: sessions.len() as u64,
            ..UsageStats::default()
        };
        for session in &sessions {
            let messages = self.history.list_messages(user_id, &session.id).await?;
            stats.message_count += messages.len() as u64;
            stats.estimated_bytes += messages
                .iter()
                .map(|message| message.content.len() as u64)
                .sum::<u64>();
        }
        Ok(stats)
    }
}
