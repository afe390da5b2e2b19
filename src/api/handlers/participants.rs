//! Participant handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::ReplaceParticipantsRequest;
use crate::api::extractors::Actor;
use crate::app_state::AppState;
use crate::domain::{EventId, ParticipantList};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /events/{id}/participants` — Replace the participant list.
///
/// # Errors
///
/// Returns [`GatewayError::Forbidden`] unless the caller owns the event.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/participants",
    tag = "Participants",
    summary = "Replace participants",
    description = "Replaces the event's participants with the given users. The event owner is always re-added.",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    request_body = ReplaceParticipantsRequest,
    responses(
        (status = 200, description = "New participant list", body = ParticipantList),
        (status = 400, description = "Unknown user", body = ErrorResponse),
        (status = 403, description = "Caller is not the owner", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn replace_participants(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<ReplaceParticipantsRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let list = state
        .participants
        .replace(EventId::from_uuid(id), actor, &req.participant_ids)
        .await?;
    Ok(Json(list))
}

/// `GET /events/{id}/participants` — List participants.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the event does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/participants",
    tag = "Participants",
    summary = "List participants",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Participant list", body = ParticipantList),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn list_participants(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.participants.list(EventId::from_uuid(id)).await?))
}

/// Participant routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/events/{id}/participants",
        post(replace_participants).get(list_participants),
    )
}
