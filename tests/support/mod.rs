#![allow(dead_code)]

use async_trait::async_trait;
use parley::app::Services;
use parley::chat::ChatService;
use parley::error::UpstreamError;
use parley::history::{ChatMessage, HistoryStore, SqliteHistoryStore};
use parley::providers::ReplyProvider;
use parley::retention::{RetentionSweeper, StatsAggregator, WriteGuard};
use parley::settings::{SettingsStore, SqliteSettingsStore};
use parley::speech::{AudioFileStore, SpeechRenderer, VoiceInfo};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tempfile::TempDir;

/// Deterministic reply provider: echoes the prompt and the context size.
pub struct EchoProvider;

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

/// Fixed-output speech renderer.
pub struct StaticSpeech;

#[async_trait]
impl SpeechRenderer for StaticSpeech {
    async fn synthesize(
        &self,
        _text: &str,
        _voice: &str,
        _speed: f64,
    ) -> Result<Vec<u8>, UpstreamError> {
        Ok(vec![0x49, 0x44, 0x33])
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        vec![VoiceInfo {
            id: "test".into(),
            label: "Test".into(),
        }]
    }

    fn languages(&self) -> Vec<String> {
        vec!["en".into()]
    }
}

/// An in-memory service graph plus the handles tests poke at directly.
pub struct TestEnv {
    pub pool: SqlitePool,
    pub services: Arc<Services>,
    _audio_dir: TempDir,
}

pub async fn memory_env() -> TestEnv {
    memory_env_with(Arc::new(EchoProvider)).await
}

pub async fn memory_env_with(provider: Arc<dyn ReplyProvider>) -> TestEnv {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let settings: Arc<dyn SettingsStore> =
        Arc::new(SqliteSettingsStore::new(pool.clone()).await.unwrap());
    let history: Arc<dyn HistoryStore> =
        Arc::new(SqliteHistoryStore::new(pool.clone()).await.unwrap());
    let sweeper = Arc::new(RetentionSweeper::new(settings.clone(), history.clone()));
    let guard = Arc::new(WriteGuard::new(
        settings.clone(),
        history.clone(),
        sweeper.clone(),
    ));
    let stats = Arc::new(StatsAggregator::new(history.clone()));
    let chat = Arc::new(ChatService::new(guard.clone(), history.clone(), provider));

    let audio_dir = TempDir::new().unwrap();
    let audio = Arc::new(AudioFileStore::new(audio_dir.path()));
    let speech: Arc<dyn SpeechRenderer> = Arc::new(StaticSpeech);

    let services = Arc::new(Services {
        settings,
        history,
        guard,
        sweeper,
        stats,
        chat,
        speech,
        audio,
    });

    TestEnv {
        pool,
        services,
        _audio_dir: audio_dir,
    }
}

/// Rewrite a session's `created_at` so retention tests can age it.
pub async fn backdate_session(pool: &SqlitePool, session_id: &str, days: i64) {
    let created_at = (chrono::Utc::now() - chrono::Duration::days(days)).to_rfc3339();
    sqlx::query("UPDATE chat_sessions SET created_at = $1 WHERE id = $2")
        .bind(created_at)
        .bind(session_id)
        .execute(pool)
        .await
        .unwrap();
}
