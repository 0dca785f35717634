use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message. Messages are immutable once created; there is no
/// edit operation and no system role on this surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A chat session owned by exactly one user.
///
/// `archived` is independent of deletion: archived sessions drop out of the
/// default listing but remain subject to retention sweeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A message owned by exactly one session. Deleting the session deletes all
/// of its messages as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Partial session update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub archived: Option<bool>,
}
