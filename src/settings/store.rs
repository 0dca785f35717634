use super::types::{SettingsPatch, UserSettings};
use crate::error::SettingsError;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::future::Future;
use std::pin::Pin;

/// Async settings persistence contract.
///
/// `get` creates the default record on first access; `update` validates the
/// patch before touching the store. Records are never deleted; a user's
/// preferences outlive every session they own.
pub trait SettingsStore: Send + Sync {
    fn get<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<UserSettings, SettingsError>> + Send + 'a>>;

    fn update<'a>(
        &'a self,
        user_id: &'a str,
        patch: SettingsPatch,
    ) -> Pin<Box<dyn Future<Output = Result<UserSettings, SettingsError>> + Send + 'a>>;
}

/// SQLite-backed settings store using sqlx async pool.
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Create a new store with an existing pool and ensure the schema.
    pub async fn new(pool: SqlitePool) -> Result<Self, SettingsError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_settings (
                 user_id TEXT PRIMARY KEY,
                 save_chat_history INTEGER NOT NULL DEFAULT 1,
                 auto_delete_history INTEGER NOT NULL DEFAULT 0,
                 auto_delete_days INTEGER NOT NULL DEFAULT 30,
                 theme TEXT NOT NULL DEFAULT 'system',
                 language TEXT NOT NULL DEFAULT 'en',
                 notifications INTEGER NOT NULL DEFAULT 1,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             )",
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

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>, SettingsError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| SettingsError::Store(format!("parse {column}: {e}")))
}

fn map_settings_row(row: &SqliteRow) -> Result<UserSettings, SettingsError> {
    let days: i64 = row.try_get("auto_delete_days")?;
    let days = u32::try_from(days)
        .map_err(|_| SettingsError::Store(format!("auto_delete_days out of range: {days}")))?;
    let created_raw: String = row.try_get("created_at")?;
    let updated_raw: String = row.try_get("updated_at")?;

    Ok(UserSettings {
        user_id: row.try_get("user_id")?,
        save_chat_history: row.try_get("save_chat_history")?,
        auto_delete_history: row.try_get("auto_delete_history")?,
        auto_delete_days: days,
        theme: row.try_get("theme")?,
        language: row.try_get("language")?,
        notifications: row.try_get("notifications")?,
        created_at: parse_timestamp(&created_raw, "created_at")?,
        updated_at: parse_timestamp(&updated_raw, "updated_at")?,
    })
}

const SELECT_SETTINGS: &str = "SELECT user_id, save_chat_history, auto_delete_history,
        auto_delete_days, theme, language, notifications, created_at, updated_at
 FROM user_settings
 WHERE user_id = $1";

impl SettingsStore for SqliteSettingsStore {
    fn get<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<UserSettings, SettingsError>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(row) = sqlx::query(SELECT_SETTINGS)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?
            {
                return map_settings_row(&row);
            }

            // Lazy creation. INSERT OR IGNORE keeps a concurrent first
            // access for the same user from failing on the primary key.
            let defaults = UserSettings::defaults_for(user_id, Utc::now());
            sqlx::query(
                "INSERT OR IGNORE INTO user_settings
                     (user_id, save_chat_history, auto_delete_history, auto_delete_days,
                      theme, language, notifications, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)",
            )
            .bind(user_id)
            .bind(defaults.save_chat_history)
            .bind(defaults.auto_delete_history)
            .bind(i64::from(defaults.auto_delete_days))
            .bind(&defaults.theme)
            .bind(&defaults.language)
            .bind(defaults.notifications)
            .bind(defaults.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

            let row = sqlx::query(SELECT_SETTINGS)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
            map_settings_row(&row)
        })
    }

    fn update<'a>(
        &'a self,
        user_id: &'a str,
        patch: SettingsPatch,
    ) -> Pin<Box<dyn Future<Output = Result<UserSettings, SettingsError>> + Send + 'a>> {
        Box::pin(async move {
            patch.validate()?;

            let mut settings = self.get(user_id).await?;
            patch.apply_to(&mut settings);
            settings.updated_at = Utc::now();

            sqlx::query(
                "UPDATE user_settings
                 SET save_chat_history = $1, auto_delete_history = $2,
                     auto_delete_days = $3, theme = $4, language = $5,
                     notifications = $6, updated_at = $7
                 WHERE user_id = $8",
            )
            .bind(settings.save_chat_history)
            .bind(settings.auto_delete_history)
            .bind(i64::from(settings.auto_delete_days))
            .bind(&settings.theme)
            .bind(&settings.language)
            .bind(settings.notifications)
            .bind(settings.updated_at.to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

            Ok(settings)
        })
    }
}
