use super::{AppState, envelope_from_error, error_envelope, ok_envelope};
use crate::error::ParleyError;
use crate::history::{HistoryStore, MessageRole, SessionPatch};
use crate::settings::{SettingsPatch, SettingsStore};
use crate::speech::SpeechRenderer;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::Value;

/// Callers are identified by this header; authentication proper is the
/// deployment's concern, not the engine's.
const USER_HEADER: &str = "X-User-Id";

fn user_id(headers: &HeaderMap) -> Result<String, (StatusCode, Json<Value>)> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| {
            error_envelope(
                StatusCode::BAD_REQUEST,
                format!("missing {USER_HEADER} header"),
            )
        })
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, (StatusCode, Json<Value>)> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(e) => Err(error_envelope(
            StatusCode::BAD_REQUEST,
            format!("invalid JSON body: {e}"),
        )),
    }
}

// ── Health ────────────────────────────────────────────────────

/// GET /health — always public
pub(super) async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

// ── Chat ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct ChatBody {
    pub session_id: Option<String>,
    pub message: String,
}

/// POST /api/chat — one chat turn
pub(super) async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    if body.message.trim().is_empty() {
        return error_envelope(StatusCode::BAD_REQUEST, "message must not be empty");
    }

    match state
        .services
        .chat
        .chat(&user, body.session_id.as_deref(), &body.message)
        .await
    {
        Ok(turn) => ok_envelope(turn),
        Err(e) => envelope_from_error(&e),
    }
}

// ── Sessions ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct ListSessionsQuery {
    pub archived: Option<bool>,
}

/// GET /api/sessions — archived sessions are excluded unless asked for
pub(super) async fn handle_list_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListSessionsQuery>,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let archived = Some(query.archived.unwrap_or(false));
    match state.services.history.list_sessions(&user, archived).await {
        Ok(sessions) => ok_envelope(sessions),
        Err(e) => envelope_from_error(&e.into()),
    }
}

#[derive(Deserialize)]
pub(super) struct CreateSessionBody {
    pub title: String,
}

/// POST /api/sessions — policy-gated
pub(super) async fn handle_create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateSessionBody>, JsonRejection>,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match state.services.guard.create_session(&user, &body.title).await {
        Ok(session) => ok_envelope(session),
        Err(e) => envelope_from_error(&e),
    }
}

/// PATCH /api/sessions/{id}
pub(super) async fn handle_update_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    body: Result<Json<SessionPatch>, JsonRejection>,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let patch = match parse_body(body) {
        Ok(patch) => patch,
        Err(response) => return response,
    };

    match state
        .services
        .history
        .update_session(&user, &session_id, patch)
        .await
    {
        Ok(session) => ok_envelope(session),
        Err(e) => envelope_from_error(&e.into()),
    }
}

/// DELETE /api/sessions/{id}
pub(super) async fn handle_delete_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state
        .services
        .history
        .delete_session(&user, &session_id)
        .await
    {
        Ok(true) => ok_envelope(serde_json::json!({"deleted": true})),
        Ok(false) => error_envelope(
            StatusCode::NOT_FOUND,
            format!("session not found: {session_id}"),
        ),
        Err(e) => envelope_from_error(&e.into()),
    }
}

#[derive(Deserialize)]
pub(super) struct AppendMessageBody {
    pub role: MessageRole,
    pub content: String,
}

/// POST /api/sessions/{id}/messages — policy-gated append
pub(super) async fn handle_append_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    body: Result<Json<AppendMessageBody>, JsonRejection>,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match state
        .services
        .guard
        .append_message(&user, &session_id, body.role, &body.content)
        .await
    {
        Ok(message) => ok_envelope(message),
        Err(e) => envelope_from_error(&e),
    }
}

/// GET /api/sessions/{id}/messages
pub(super) async fn handle_list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state
        .services
        .history
        .list_messages(&user, &session_id)
        .await
    {
        Ok(messages) => ok_envelope(messages),
        Err(e) => envelope_from_error(&e.into()),
    }
}

/// DELETE /api/history — clear everything, regardless of policy
pub(super) async fn handle_clear_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.services.sweeper.purge_all(&user).await {
        Ok(deleted) => ok_envelope(serde_json::json!({"deleted": deleted})),
        Err(e) => envelope_from_error(&e),
    }
}

/// POST /api/sweep — run one retention sweep for the caller
pub(super) async fn handle_sweep(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.services.sweeper.sweep(&user).await {
        Ok(deleted) => ok_envelope(serde_json::json!({"deleted": deleted})),
        Err(e) => envelope_from_error(&e),
    }
}

// ── Statistics ────────────────────────────────────────────────

/// GET /api/stats — sweeps first so the numbers reflect current policy
pub(super) async fn handle_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    if let Err(error) = state.services.sweeper.sweep(&user).await {
        tracing::warn!(user_id = %user, error = %error, "pre-stats sweep failed");
    }

    match state.services.stats.compute(&user).await {
        Ok(stats) => ok_envelope(stats),
        Err(e) => envelope_from_error(&e),
    }
}

// ── Settings ──────────────────────────────────────────────────

/// GET /api/settings — creates the default record on first access
pub(super) async fn handle_get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.services.settings.get(&user).await {
        Ok(settings) => ok_envelope(settings),
        Err(e) => envelope_from_error(&e.into()),
    }
}

/// PUT /api/settings — validated patch
pub(super) async fn handle_update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SettingsPatch>, JsonRejection>,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let patch = match parse_body(body) {
        Ok(patch) => patch,
        Err(response) => return response,
    };

    match state.services.settings.update(&user, patch).await {
        Ok(settings) => ok_envelope(settings),
        Err(e) => envelope_from_error(&e.into()),
    }
}

// ── Speech ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct SpeechBody {
    pub text: String,
    pub voice: Option<String>,
    pub speed: Option<f64>,
}

/// POST /api/speech — render audio, store it, return the filename
pub(super) async fn handle_speech(
    State(state): State<AppState>,
    body: Result<Json<SpeechBody>, JsonRejection>,
) -> impl IntoResponse {
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    if body.text.trim().is_empty() {
        return error_envelope(StatusCode::BAD_REQUEST, "text must not be empty");
    }

    let voice = body.voice.unwrap_or_else(|| state.default_voice.clone());
    let speed = body.speed.unwrap_or(state.default_speed);

    let audio = match state.services.speech.synthesize(&body.text, &voice, speed).await {
        Ok(audio) => audio,
        Err(e) => return envelope_from_error(&e.into()),
    };

    match state.services.audio.save(&audio, "mp3").await {
        Ok(filename) => ok_envelope(serde_json::json!({
            "filename": filename,
            "url": format!("/api/audio/{filename}"),
        })),
        Err(e) => envelope_from_error(&ParleyError::Other(e)),
    }
}

/// GET /api/speech/voices
pub(super) async fn handle_list_voices(State(state): State<AppState>) -> impl IntoResponse {
    ok_envelope(state.services.speech.voices())
}

/// GET /api/speech/languages
pub(super) async fn handle_list_languages(State(state): State<AppState>) -> impl IntoResponse {
    ok_envelope(state.services.speech.languages())
}

/// GET /api/audio/{filename} — raw bytes, not the envelope
pub(super) async fn handle_audio_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    match state.services.audio.load(&filename).await {
        Ok(Some(bytes)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "audio/mpeg")],
            bytes,
        )
            .into_response(),
        Ok(None) => error_envelope(
            StatusCode::NOT_FOUND,
            format!("audio file not found: {filename}"),
        )
            .into_response(),
        Err(e) => envelope_from_error(&ParleyError::Other(e)).into_response(),
    }
}
