//! Session REST routes — create, fetch, and owner teardown.
//!
//! The identity layer in front of these routes is external; requests arrive
//! with an already-issued `owner_id`. Errors map onto HTTP-style codes:
//! 404 unknown id, 410 for lapsed guest sessions, 400 for malformed specs.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{ServerEvent, SessionError};
use crate::services::room;
use crate::services::store::SessionSpec;
use crate::state::{AppState, Session};

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub id: Uuid,
    pub session: Session,
}

#[derive(Debug, Serialize)]
pub struct GetSessionResponse {
    pub session: Session,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<i64>,
}

#[derive(Deserialize)]
pub struct TeardownParams {
    pub owner_id: Uuid,
}

/// `POST /api/session` — start a collaboration.
pub async fn create_session(
    State(state): State<AppState>,
    Json(spec): Json<SessionSpec>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), StatusCode> {
    let session = state.store.create(spec).await.map_err(error_to_status)?;
    Ok((StatusCode::CREATED, Json(CreateSessionResponse { id: session.id, session })))
}

/// `GET /api/session/{id}` — fetch a session snapshot, with the guest
/// countdown when one applies.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<GetSessionResponse>, StatusCode> {
    let session = state.store.get(session_id).await.map_err(error_to_status)?;
    let remaining_minutes = state
        .store
        .remaining_lifetime_ms(session_id)
        .await
        .map_err(error_to_status)?
        .map(|ms| ms / 60_000);
    Ok(Json(GetSessionResponse { session, remaining_minutes }))
}

/// `DELETE /api/session/{id}` — owner-initiated teardown. Still-connected
/// members get a terminal `session-closed` before the room is evicted,
/// mirroring the sweeper's `session-expired`.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<TeardownParams>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    state.store.teardown(session_id, params.owner_id).await.map_err(error_to_status)?;
    room::broadcast(&state.presence, session_id, &ServerEvent::SessionClosed { session_id }, None).await;
    state.presence.evict_session(session_id).await;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub(crate) fn error_to_status(err: SessionError) -> StatusCode {
    match err {
        SessionError::NotFound(_) | SessionError::CommentNotFound(_) => StatusCode::NOT_FOUND,
        SessionError::Expired(_) => StatusCode::GONE,
        SessionError::InvalidSpec(_) | SessionError::InvalidValue(_) => StatusCode::BAD_REQUEST,
        SessionError::Unauthorized(_) => StatusCode::FORBIDDEN,
    }
}

#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;
