//! Pure retention-policy evaluation.
//!
//! No I/O and no stored state, so the boundary behavior can be tested
//! exhaustively without a persistence substrate. Every write path and every
//! sweep decision in the crate funnels through these two functions.

use crate::settings::UserSettings;
use chrono::{DateTime, Duration, Utc};

/// Whether new chat data may be persisted for this user at all.
///
/// This gates future writes only. Existing data is left untouched when the
/// switch is off; removal goes through the sweeper or the explicit
/// clear-history action.
pub fn can_persist(settings: &UserSettings) -> bool {
    settings.save_chat_history
}

/// Whether a record created at `created_at` has outlived the user's
/// auto-delete threshold at time `now`.
///
/// Strictly greater than the threshold: a record created exactly
/// `auto_delete_days` ago is NOT expired, so nothing is deleted at the exact
/// boundary instant. Always false while `auto_delete_history` is off,
/// regardless of age.
pub fn is_expired(settings: &UserSettings, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    if !settings.auto_delete_history {
        return false;
    }
    now.signed_duration_since(created_at) > Duration::days(i64::from(settings.auto_delete_days))
}
