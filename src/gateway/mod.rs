//! Axum-based HTTP gateway.
//!
//! Thin by design: every route resolves the caller, maps into a core
//! operation, and wraps the outcome in the uniform envelope of
//! `{"success": true, "data": …}` or `{"success": false, "error": "…"}`.
//! Body limits and request timeouts guard the listener.

mod handlers;

use crate::app::{self, Services};
use crate::config::Config;
use crate::error::{HistoryError, ParleyError, SettingsError};
use anyhow::Result;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use handlers::{
    handle_append_message, handle_audio_file, handle_chat, handle_clear_history,
    handle_create_session, handle_delete_session, handle_get_settings, handle_health,
    handle_list_languages, handle_list_messages, handle_list_sessions, handle_list_voices,
    handle_speech, handle_stats, handle_sweep, handle_update_session, handle_update_settings,
};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB) — prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) — prevents slow-loris attacks
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub default_voice: String,
    pub default_speed: f64,
}

// ── Response envelope ─────────────────────────────────────────

pub(super) fn ok_envelope(data: impl Serialize) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({"success": true, "data": data})),
    )
}

pub(super) fn error_envelope(
    status: StatusCode,
    message: impl std::fmt::Display,
) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(serde_json::json!({"success": false, "error": message.to_string()})),
    )
}

/// Map the core error taxonomy onto statuses. Everything stays inside the
/// envelope; nothing here is fatal.
pub(super) fn envelope_from_error(err: &ParleyError) -> (StatusCode, Json<Value>) {
    let status = match err {
        ParleyError::Settings(SettingsError::Validation(_)) => StatusCode::BAD_REQUEST,
        ParleyError::History(HistoryError::NotFound(_)) => StatusCode::NOT_FOUND,
        ParleyError::History(HistoryError::HistoryDisabled) => StatusCode::FORBIDDEN,
        ParleyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "request failed");
    }
    error_envelope(status, err)
}

// ── Router / server ───────────────────────────────────────────

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/chat", post(handle_chat))
        .route(
            "/api/sessions",
            get(handle_list_sessions).post(handle_create_session),
        )
        .route(
            "/api/sessions/{id}",
            patch(handle_update_session).delete(handle_delete_session),
        )
        .route(
            "/api/sessions/{id}/messages",
            get(handle_list_messages).post(handle_append_message),
        )
        .route("/api/history", delete(handle_clear_history))
        .route("/api/sweep", post(handle_sweep))
        .route("/api/stats", get(handle_stats))
        .route(
            "/api/settings",
            get(handle_get_settings).put(handle_update_settings),
        )
        .route("/api/speech", post(handle_speech))
        .route("/api/speech/voices", get(handle_list_voices))
        .route("/api/speech/languages", get(handle_list_languages))
        .route("/api/audio/{filename}", get(handle_audio_file))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP gateway, plus the timer-driven sweep pass when configured.
pub async fn run_gateway(config: Config) -> Result<()> {
    let services = app::build_services(&config).await?;

    if config.retention.sweep_interval_secs > 0 {
        let sweeper = services.sweeper.clone();
        let period = Duration::from_secs(config.retention.sweep_interval_secs);
        tokio::spawn(sweeper.run_interval(period));
    }

    let state = AppState {
        services,
        default_voice: config.speech.default_voice.clone(),
        default_speed: config.speech.default_speed,
    };

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "gateway listening");

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::envelope_from_error;
    use crate::error::{HistoryError, ParleyError, SettingsError, UpstreamError};
    use axum::http::StatusCode;

    fn status_of(err: ParleyError) -> StatusCode {
        envelope_from_error(&err).0
    }

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        assert_eq!(
            status_of(SettingsError::Validation("days".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(HistoryError::NotFound("s1".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(HistoryError::HistoryDisabled.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(
                UpstreamError::Request {
                    service: "openai".into(),
                    message: "down".into(),
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(anyhow::anyhow!("boom").into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn failure_envelope_has_uniform_shape() {
        let (_, body) = envelope_from_error(&HistoryError::HistoryDisabled.into());
        assert_eq!(body.0["success"], false);
        assert!(body.0["error"].as_str().unwrap().contains("disabled"));
    }
}
