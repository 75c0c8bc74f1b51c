use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::net::client::spawn_session_serializer;
use crate::interface_adapters::protocol::{PlayerDto, SessionSnapshotDto};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng;
use crate::use_cases::RegistryError;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

const DEFAULT_PLAYER_NAME: &str = "Player";
const MAX_PLAYER_NAME_LEN: usize = 32;

#[derive(Debug, serde::Deserialize)]
pub struct CreateSessionRequest {
    // Owner identity; an opaque account identifier supplied by the caller.
    player_id: String,
    #[serde(default)]
    player_name: String,
    // Omitted means the configured default game length.
    #[serde(default)]
    duration_seconds: Option<i64>,
}

#[derive(Debug, serde::Serialize)]
struct CreateSessionResponse {
    session_id: String,
    player: PlayerDto,
    session: SessionSnapshotDto,
}

/// Normalizes a display name: trimmed, bounded, defaulted when blank.
pub(crate) fn sanitize_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return DEFAULT_PLAYER_NAME.to_string();
    }
    if name.len() > MAX_PLAYER_NAME_LEN {
        return DEFAULT_PLAYER_NAME.to_string();
    }
    name.to_string()
}

pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    let player_id = payload.player_id.trim().to_string();
    if player_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "player_id is required".to_string(),
            }),
        )
            .into_response();
    }
    let player_name = sanitize_name(&payload.player_name);
    let duration_seconds = payload
        .duration_seconds
        .unwrap_or(state.registry.default_duration().as_secs() as i64);

    let session_id = rng::session_id();
    match state
        .registry
        .create_session(session_id.clone(), &player_id, &player_name, duration_seconds)
        .await
    {
        Ok((handle, snapshot)) => {
            // Serialize events from the first subscriber onward.
            spawn_session_serializer(&handle);

            let Some(player) = snapshot
                .players
                .iter()
                .find(|p| p.id == player_id)
                .map(PlayerDto::from)
            else {
                // The owner is inserted before the snapshot is taken; missing
                // means a registry bug, not a caller error.
                tracing::error!(%session_id, player_id, "owner missing from create snapshot");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "session creation failed".to_string(),
                    }),
                )
                    .into_response();
            };

            (
                StatusCode::CREATED,
                Json(CreateSessionResponse {
                    session_id,
                    player,
                    session: SessionSnapshotDto::from(&snapshot),
                }),
            )
                .into_response()
        }
        Err(RegistryError::InvalidDuration) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "duration_seconds must be positive".to_string(),
            }),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(%session_id, error = ?err, "unexpected create failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "session creation failed".to_string(),
                }),
            )
                .into_response()
        }
    }
}

pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get_snapshot(&session_id).await {
        Ok(snapshot) => (StatusCode::OK, Json(SessionSnapshotDto::from(&snapshot))).into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "session not found".to_string(),
            }),
        )
            .into_response(),
    }
}
