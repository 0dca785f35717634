use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for Parley.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains. Every variant is recoverable
/// by the caller; nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum ParleyError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Settings ────────────────────────────────────────────────────────
    #[error("settings: {0}")]
    Settings(#[from] SettingsError),

    // ── History ─────────────────────────────────────────────────────────
    #[error("history: {0}")]
    History(#[from] HistoryError),

    // ── Upstream collaborators (AI reply, speech) ───────────────────────
    #[error("upstream: {0}")]
    Upstream(#[from] UpstreamError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Settings errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SettingsError {
    /// Bad input shape or range. Raised before any store mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("store: {0}")]
    Store(String),
}

impl From<sqlx::Error> for SettingsError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}

// ─── History errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum HistoryError {
    /// Session absent, or owned by a different user. Ownership mismatches
    /// deliberately surface as not-found so callers learn nothing about
    /// other users' data.
    #[error("session not found: {0}")]
    NotFound(String),

    /// Write denied because the user's `save_chat_history` switch is off.
    /// Not a failure of the surrounding operation: a chat turn still
    /// returns its generated reply when it sees this.
    #[error("history saving is disabled for this user")]
    HistoryDisabled,

    #[error("store: {0}")]
    Store(String),
}

impl From<sqlx::Error> for HistoryError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}

// ─── Upstream errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} request failed: {message}")]
    Request { service: String, message: String },

    #[error("{service} returned status {status}: {message}")]
    Status {
        service: String,
        status: u16,
        message: String,
    },

    #[error("{service} returned an unreadable response: {message}")]
    Decode { service: String, message: String },
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, ParleyError>;
