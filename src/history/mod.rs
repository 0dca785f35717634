pub mod store;
pub mod types;

pub use store::{HistoryStore, SqliteHistoryStore};
pub use types::{ChatMessage, ChatSession, MessageRole, SessionPatch};
