use crate::error::{HistoryError, ParleyError, Result};
use crate::history::{ChatMessage, HistoryStore, MessageRole};
use crate::providers::ReplyProvider;
use crate::retention::WriteGuard;
use serde::Serialize;
use std::sync::Arc;

const DERIVED_TITLE_MAX: usize = 48;

/// Outcome of one chat turn. `persisted` is false when the user's retention
/// policy denied storage for any part of the turn; the reply is returned
/// either way.
#[derive(Debug, Serialize)]
pub struct ChatTurn {
    pub reply: String,
    pub session_id: Option<String>,
    pub persisted: bool,
}

/// One chat turn end to end: persist the inbound message through the write
/// guard (policy denial tolerated), generate the reply, persist the reply
/// under the same tolerance.
///
/// Persistence failure never blocks the response payload; a generation
/// failure surfaces after the user's message was already considered for
/// persistence on its own.
pub struct ChatService {
    guard: Arc<WriteGuard>,
    history: Arc<dyn HistoryStore>,
    provider: Arc<dyn ReplyProvider>,
}

fn derive_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= DERIVED_TITLE_MAX {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(DERIVED_TITLE_MAX).collect();
    format!("{cut}…")
}

impl ChatService {
    pub fn new(
        guard: Arc<WriteGuard>,
        history: Arc<dyn HistoryStore>,
        provider: Arc<dyn ReplyProvider>,
    ) -> Self {
        Self {
            guard,
            history,
            provider,
        }
    }

    pub async fn chat(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        text: &str,
    ) -> Result<ChatTurn> {
        let mut persisted = true;

        // Conversation context comes from reads, which bypass the guard:
        // a user with saving disabled still converses over what exists.
        let context: Vec<ChatMessage> = match session_id {
            Some(id) => self.history.list_messages(user_id, id).await?,
            None => Vec::new(),
        };

        let session_id = match session_id {
            Some(id) => {
                match self
                    .guard
                    .append_message(user_id, id, MessageRole::User, text)
                    .await
                {
                    Ok(_) => Some(id.to_string()),
                    Err(ParleyError::History(HistoryError::HistoryDisabled)) => {
                        persisted = false;
                        Some(id.to_string())
                    }
                    Err(e) => return Err(e),
                }
            }
            None => match self.guard.create_session(user_id, &derive_title(text)).await {
                Ok(session) => {
                    self.guard
                        .append_message(user_id, &session.id, MessageRole::User, text)
                        .await?;
                    Some(session.id)
                }
                Err(ParleyError::History(HistoryError::HistoryDisabled)) => {
                    persisted = false;
                    None
                }
                Err(e) => return Err(e),
            },
        };

        let reply = self.provider.generate(text, &context).await?;

        if let Some(ref id) = session_id {
            match self
                .guard
                .append_message(user_id, id, MessageRole::Assistant, &reply)
                .await
            {
                Ok(_) => {}
                Err(ParleyError::History(HistoryError::HistoryDisabled)) => {
                    // Policy flipped mid-turn; the reply still goes out.
                    persisted = false;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(ChatTurn {
            reply,
            session_id,
            persisted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ChatService, derive_title};
    use crate::error::{ParleyError, UpstreamError};
    use crate::history::store::{HistoryStore, SqliteHistoryStore};
    use crate::history::types::{ChatMessage, MessageRole};
    use crate::providers::ReplyProvider;
    use crate::retention::{RetentionSweeper, WriteGuard};
    use crate::settings::store::{SettingsStore, SqliteSettingsStore};
    use crate::settings::types::SettingsPatch;
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    struct EchoProvider;

    #[async_trait]
    impl ReplyProvider for EchoProvider {
        async fn generate(
            &self,
            prompt: &str,
            context: &[ChatMessage],
        ) -> Result<String, UpstreamError> {
            Ok(format!("echo({prompt}) ctx={}", context.len()))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ReplyProvider for FailingProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _context: &[ChatMessage],
        ) -> Result<String, UpstreamError> {
            Err(UpstreamError::Request {
                service: "test".into(),
                message: "down".into(),
            })
        }
    }

    struct Fixture {
        settings: Arc<SqliteSettingsStore>,
        history: Arc<SqliteHistoryStore>,
        service: ChatService,
    }

    async fn fixture(provider: Arc<dyn ReplyProvider>) -> Fixture {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let settings = Arc::new(SqliteSettingsStore::new(pool.clone()).await.unwrap());
        let history = Arc::new(SqliteHistoryStore::new(pool.clone()).await.unwrap());
        let sweeper = Arc::new(RetentionSweeper::new(settings.clone(), history.clone()));
        let guard = Arc::new(WriteGuard::new(settings.clone(), history.clone(), sweeper));
        let service = ChatService::new(guard, history.clone(), provider);
        Fixture {
            settings,
            history,
            service,
        }
    }

    #[tokio::test]
    async fn fresh_turn_creates_session_and_persists_both_messages() {
        let fx = fixture(Arc::new(EchoProvider)).await;

        let turn = fx.service.chat("u1", None, "hello there").await.unwrap();

        assert!(turn.persisted);
        let session_id = turn.session_id.expect("session created");
        let messages = fx.history.list_messages("u1", &session_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "hello there");
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, turn.reply);
    }

    #[tokio::test]
    async fn reply_still_returned_when_history_disabled() {
        let fx = fixture(Arc::new(EchoProvider)).await;
        fx.settings
            .update(
                "u1",
                SettingsPatch {
                    save_chat_history: Some(false),
                    ..SettingsPatch::default()
                },
            )
            .await
            .unwrap();

        let turn = fx.service.chat("u1", None, "hi").await.unwrap();

        assert!(!turn.persisted);
        assert!(turn.session_id.is_none());
        assert_eq!(turn.reply, "echo(hi) ctx=0");
        assert!(fx.history.list_sessions("u1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn continuing_turn_feeds_prior_messages_as_context() {
        let fx = fixture(Arc::new(EchoProvider)).await;
        let first = fx.service.chat("u1", None, "first").await.unwrap();
        let session_id = first.session_id.unwrap();

        let second = fx
            .service
            .chat("u1", Some(&session_id), "second")
            .await
            .unwrap();

        // Context is the history before this turn: user+assistant pair.
        assert_eq!(second.reply, "echo(second) ctx=2");
        let messages = fx.history.list_messages("u1", &session_id).await.unwrap();
        assert_eq!(messages.len(), 4);
    }

    #[tokio::test]
    async fn provider_failure_surfaces_but_user_message_is_kept() {
        let fx = fixture(Arc::new(FailingProvider)).await;
        let session = fx
            .history
            .create_session("u1", "Pre-existing")
            .await
            .unwrap();

        let err = fx
            .service
            .chat("u1", Some(&session.id), "doomed prompt")
            .await
            .unwrap_err();

        assert!(matches!(err, ParleyError::Upstream(_)));
        let messages = fx.history.list_messages("u1", &session.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "doomed prompt");
    }

    #[tokio::test]
    async fn chatting_into_foreign_session_fails_before_generation() {
        let fx = fixture(Arc::new(EchoProvider)).await;
        let session = fx.history.create_session("u1", "Mine").await.unwrap();

        let err = fx
            .service
            .chat("u2", Some(&session.id), "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, ParleyError::History(_)));
    }

    #[test]
    fn derive_title_truncates_long_prompts() {
        let short = derive_title("Short prompt");
        let long = derive_title(&"x".repeat(100));

        assert_eq!(short, "Short prompt");
        assert_eq!(long.chars().count(), 49);
        assert!(long.ends_with('…'));
    }
}
