pub mod store;
pub mod types;

pub use store::{SettingsStore, SqliteSettingsStore};
pub use types::{SettingsPatch, UserSettings};
