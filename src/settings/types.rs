use crate::error::SettingsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive bounds for the auto-delete threshold, in days.
pub const MIN_AUTO_DELETE_DAYS: u32 = 1;
pub const MAX_AUTO_DELETE_DAYS: u32 = 365;

/// Threshold written to a lazily created record. Inert until
/// `auto_delete_history` is switched on.
pub const DEFAULT_AUTO_DELETE_DAYS: u32 = 30;

/// Per-user preference record. One row per user, created on first access,
/// never deleted.
///
/// `save_chat_history` and the `auto_delete_*` pair form the user's
/// retention policy; the rest are presentation preferences with no
/// retention effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: String,
    /// Master switch; `false` blocks all new persistence for this user.
    pub save_chat_history: bool,
    /// Enables age-based expiry of whole sessions.
    pub auto_delete_history: bool,
    /// Expiry threshold in days. Only meaningful while
    /// `auto_delete_history` is true.
    pub auto_delete_days: u32,
    pub theme: String,
    pub language: String,
    pub notifications: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    /// The documented defaults written on lazy creation.
    pub fn defaults_for(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            save_chat_history: true,
            auto_delete_history: false,
            auto_delete_days: DEFAULT_AUTO_DELETE_DAYS,
            theme: "system".to_string(),
            language: "en".to_string(),
            notifications: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial settings update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub save_chat_history: Option<bool>,
    pub auto_delete_history: Option<bool>,
    pub auto_delete_days: Option<u32>,
    pub theme: Option<String>,
    pub language: Option<String>,
    pub notifications: Option<bool>,
}

impl SettingsPatch {
    /// Reject out-of-range values before any store mutation. Out-of-range
    /// days are an error, never clamped.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(days) = self.auto_delete_days {
            if !(MIN_AUTO_DELETE_DAYS..=MAX_AUTO_DELETE_DAYS).contains(&days) {
                return Err(SettingsError::Validation(format!(
                    "auto_delete_days must be within {MIN_AUTO_DELETE_DAYS}..={MAX_AUTO_DELETE_DAYS}, got {days}"
                )));
            }
        }
        Ok(())
    }

    /// Apply this patch on top of an existing record.
    pub fn apply_to(&self, settings: &mut UserSettings) {
        if let Some(save) = self.save_chat_history {
            settings.save_chat_history = save;
        }
        if let Some(auto) = self.auto_delete_history {
            settings.auto_delete_history = auto;
        }
        if let Some(days) = self.auto_delete_days {
            settings.auto_delete_days = days;
        }
        if let Some(ref theme) = self.theme {
            settings.theme = theme.clone();
        }
        if let Some(ref language) = self.language {
            settings.language = language.clone();
        }
        if let Some(notifications) = self.notifications {
            settings.notifications = notifications;
        }
    }
}
