use crate::chat::ChatService;
use crate::config::Config;
use crate::error::Result;
use crate::history::{HistoryStore, SqliteHistoryStore};
use crate::providers::{OpenAiProvider, ReplyProvider};
use crate::retention::{RetentionSweeper, StatsAggregator, WriteGuard};
use crate::settings::{SettingsStore, SqliteSettingsStore};
use crate::speech::{AudioFileStore, OpenAiSpeech, SpeechRenderer};
use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::sync::Arc;

/// Everything the gateway and the CLI commands operate on, wired once.
pub struct Services {
    pub settings: Arc<dyn SettingsStore>,
    pub history: Arc<dyn HistoryStore>,
    pub guard: Arc<WriteGuard>,
    pub sweeper: Arc<RetentionSweeper>,
    pub stats: Arc<StatsAggregator>,
    pub chat: Arc<ChatService>,
    pub speech: Arc<dyn SpeechRenderer>,
    pub audio: Arc<AudioFileStore>,
}

/// Open the workspace database and build the service graph.
pub async fn build_services(config: &Config) -> Result<Arc<Services>> {
    let options = SqliteConnectOptions::new()
        .filename(config.db_path())
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .context("open workspace database")?;

    let settings: Arc<dyn SettingsStore> = Arc::new(SqliteSettingsStore::new(pool.clone()).await?);
    let history: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::new(pool).await?);

    let sweeper = Arc::new(RetentionSweeper::new(settings.clone(), history.clone()));
    let guard = Arc::new(WriteGuard::new(
        settings.clone(),
        history.clone(),
        sweeper.clone(),
    ));
    let stats = Arc::new(StatsAggregator::new(history.clone()));

    let api_key = config.resolve_api_key();
    let provider: Arc<dyn ReplyProvider> = Arc::new(OpenAiProvider::new(
        api_key.as_deref(),
        &config.provider.base_url,
        &config.provider.model,
        config.provider.temperature,
    ));
    let chat = Arc::new(ChatService::new(
        guard.clone(),
        history.clone(),
        provider,
    ));

    let speech: Arc<dyn SpeechRenderer> = Arc::new(OpenAiSpeech::new(
        api_key.as_deref(),
        &config.speech.base_url,
        &config.speech.model,
    ));
    let audio = Arc::new(AudioFileStore::new(config.audio_dir()));

    Ok(Arc::new(Services {
        settings,
        history,
        guard,
        sweeper,
        stats,
        chat,
        speech,
        audio,
    }))
}
