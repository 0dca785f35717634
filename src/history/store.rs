use super::types::{ChatMessage, ChatSession, MessageRole, SessionPatch};
use crate::error::HistoryError;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

/// Async session/message persistence contract.
///
/// CRUD primitives with no retention knowledge. Every operation that names a
/// session verifies the caller's `user_id` against the session's owner and
/// fails with [`HistoryError::NotFound`] on a mismatch, never a
/// forbidden-style error, so existence is not leaked across owners.
pub trait HistoryStore: Send + Sync {
    fn create_session<'a>(
        &'a self,
        user_id: &'a str,
        title: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ChatSession, HistoryError>> + Send + 'a>>;

    fn get_session<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ChatSession, HistoryError>> + Send + 'a>>;

    /// `archived = None` returns every session the user owns (the sweeper
    /// and statistics view). The default listing surface passes
    /// `Some(false)` so archived sessions are excluded there.
    fn list_sessions<'a>(
        &'a self,
        user_id: &'a str,
        archived: Option<bool>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ChatSession>, HistoryError>> + Send + 'a>>;

    fn update_session<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
        patch: SessionPatch,
    ) -> Pin<Box<dyn Future<Output = Result<ChatSession, HistoryError>> + Send + 'a>>;

    /// Returns whether a session was deleted. Deleting an absent or
    /// foreign-owned session is `Ok(false)`, which keeps concurrent sweeps
    /// idempotent; callers that need not-found semantics map `false`
    /// themselves.
    fn delete_session<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, HistoryError>> + Send + 'a>>;

    /// Delete every session (and thus every message) the user owns.
    /// Returns the number of sessions removed.
    fn delete_all_sessions<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, HistoryError>> + Send + 'a>>;

    /// Append a message and refresh the session's `updated_at`.
    fn append_message<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
        role: MessageRole,
        content: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ChatMessage, HistoryError>> + Send + 'a>>;

    /// Messages in insertion order.
    fn list_messages<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ChatMessage>, HistoryError>> + Send + 'a>>;

    /// Distinct user ids that currently own at least one session. Feeds the
    /// interval-driven sweep.
    fn session_owners<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, HistoryError>> + Send + 'a>>;
}

/// SQLite-backed history store using sqlx async pool.
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Create a new store with an existing pool and ensure the schema.
    pub async fn new(pool: SqlitePool) -> Result<Self, HistoryError> {
        sqlx::query("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_sessions (
                 id TEXT PRIMARY KEY,
                 user_id TEXT NOT NULL,
                 title TEXT NOT NULL,
                 archived INTEGER NOT NULL DEFAULT 0,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_sessions_user
                 ON chat_sessions(user_id, created_at)",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_messages (
                 id TEXT PRIMARY KEY,
                 session_id TEXT NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
                 role TEXT NOT NULL,
                 content TEXT NOT NULL,
                 created_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_messages_session
                 ON chat_messages(session_id, created_at)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn role_to_str(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

fn str_to_role(value: &str) -> Result<MessageRole, HistoryError> {
    match value {
        "user" => Ok(MessageRole::User),
        "assistant" => Ok(MessageRole::Assistant),
        _ => Err(HistoryError::Store(format!("unknown message role: {value}"))),
    }
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>, HistoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| HistoryError::Store(format!("parse {column}: {e}")))
}

fn map_session_row(row: &SqliteRow) -> Result<ChatSession, HistoryError> {
    let created_raw: String = row.try_get("created_at")?;
    let updated_raw: String = row.try_get("updated_at")?;

    Ok(ChatSession {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        archived: row.try_get("archived")?,
        created_at: parse_timestamp(&created_raw, "created_at")?,
        updated_at: parse_timestamp(&updated_raw, "updated_at")?,
    })
}

fn map_message_row(row: &SqliteRow) -> Result<ChatMessage, HistoryError> {
    let role_raw: String = row.try_get("role")?;
    let created_raw: String = row.try_get("created_at")?;

    Ok(ChatMessage {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        role: str_to_role(&role_raw)?,
        content: row.try_get("content")?,
        created_at: parse_timestamp(&created_raw, "created_at")?,
    })
}

const SELECT_SESSION: &str = "SELECT id, user_id, title, archived, created_at, updated_at
 FROM chat_sessions
 WHERE id = $1 AND user_id = $2";

impl HistoryStore for SqliteHistoryStore {
    fn create_session<'a>(
        &'a self,
        user_id: &'a str,
        title: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ChatSession, HistoryError>> + Send + 'a>> {
        Box::pin(async move {
            let session_id = Uuid::new_v4().to_string();
            let now = Utc::now();

            sqlx::query(
                "INSERT INTO chat_sessions (id, user_id, title, archived, created_at, updated_at)
                 VALUES ($1, $2, $3, 0, $4, $4)",
            )
            .bind(&session_id)
            .bind(user_id)
            .bind(title)
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;

            Ok(ChatSession {
                id: session_id,
                user_id: user_id.to_string(),
                title: title.to_string(),
                archived: false,
                created_at: now,
                updated_at: now,
            })
        })
    }

    fn get_session<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ChatSession, HistoryError>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(SELECT_SESSION)
                .bind(session_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

            match row {
                Some(r) => map_session_row(&r),
                None => Err(HistoryError::NotFound(session_id.to_string())),
            }
        })
    }

    fn list_sessions<'a>(
        &'a self,
        user_id: &'a str,
        archived: Option<bool>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ChatSession>, HistoryError>> + Send + 'a>> {
        Box::pin(async move {
            let rows = if let Some(archived) = archived {
                sqlx::query(
                    "SELECT id, user_id, title, archived, created_at, updated_at
                     FROM chat_sessions
                     WHERE user_id = $1 AND archived = $2
                     ORDER BY updated_at DESC",
                )
                .bind(user_id)
                .bind(archived)
                .fetch_all(&self.pool)
                .await?
            } else {
                sqlx::query(
                    "SELECT id, user_id, title, archived, created_at, updated_at
                     FROM chat_sessions
                     WHERE user_id = $1
                     ORDER BY updated_at DESC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            };

            rows.iter().map(map_session_row).collect()
        })
    }

    fn update_session<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
        patch: SessionPatch,
    ) -> Pin<Box<dyn Future<Output = Result<ChatSession, HistoryError>> + Send + 'a>> {
        Box::pin(async move {
            let mut session = self.get_session(user_id, session_id).await?;
            if let Some(title) = patch.title {
                session.title = title;
            }
            if let Some(archived) = patch.archived {
                session.archived = archived;
            }
            session.updated_at = Utc::now();

            let result = sqlx::query(
                "UPDATE chat_sessions
                 SET title = $1, archived = $2, updated_at = $3
                 WHERE id = $4 AND user_id = $5",
            )
            .bind(&session.title)
            .bind(session.archived)
            .bind(session.updated_at.to_rfc3339())
            .bind(session_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(HistoryError::NotFound(session_id.to_string()));
            }
            Ok(session)
        })
    }

    fn delete_session<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, HistoryError>> + Send + 'a>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1 AND user_id = $2")
                .bind(session_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn delete_all_sessions<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, HistoryError>> + Send + 'a>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM chat_sessions WHERE user_id = $1")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
    }

    fn append_message<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
        role: MessageRole,
        content: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ChatMessage, HistoryError>> + Send + 'a>> {
        Box::pin(async move {
            let now = Utc::now();

            // Ownership check and updated_at refresh in one statement;
            // zero rows means absent or foreign-owned.
            let touched = sqlx::query(
                "UPDATE chat_sessions
                 SET updated_at = $1
                 WHERE id = $2 AND user_id = $3",
            )
            .bind(now.to_rfc3339())
            .bind(session_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

            if touched.rows_affected() == 0 {
                return Err(HistoryError::NotFound(session_id.to_string()));
            }

            let message_id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO chat_messages (id, session_id, role, content, created_at)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&message_id)
            .bind(session_id)
            .bind(role_to_str(role))
            .bind(content)
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;

            Ok(ChatMessage {
                id: message_id,
                session_id: session_id.to_string(),
                role,
                content: content.to_string(),
                created_at: now,
            })
        })
    }

    fn list_messages<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ChatMessage>, HistoryError>> + Send + 'a>> {
        Box::pin(async move {
            // Ownership gate before touching messages.
            self.get_session(user_id, session_id).await?;

            // RFC 3339 timestamps tie within a millisecond; rowid breaks
            // ties in insertion order.
            let rows = sqlx::query(
                "SELECT id, session_id, role, content, created_at
                 FROM chat_messages
                 WHERE session_id = $1
                 ORDER BY created_at ASC, rowid ASC",
            )
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

            rows.iter().map(map_message_row).collect()
        })
    }

    fn session_owners<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, HistoryError>> + Send + 'a>> {
        Box::pin(async move {
            let rows: Vec<(String,)> =
                sqlx::query_as("SELECT DISTINCT user_id FROM chat_sessions ORDER BY user_id")
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows.into_iter().map(|(user_id,)| user_id).collect())
        })
    }
}
