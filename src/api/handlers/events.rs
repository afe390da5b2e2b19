//! Event handlers: create, get, and the owner/group listings.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::extractors::Actor;
use crate::app_state::AppState;
use crate::domain::{EventDraft, EventId, EventSummary, GroupId};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /events` — Create an event owned by the caller.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] for a blank title, no groups or
/// unknown groups.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Create an event",
    description = "Creates an event owned by the caller. The first group becomes the primary group under which secret-friend matches are recorded.",
    request_body = EventDraft,
    responses(
        (status = 201, description = "Event created", body = EventSummary),
        (status = 400, description = "Invalid draft or unknown group", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(draft): Json<EventDraft>,
) -> Result<impl IntoResponse, GatewayError> {
    let summary = state.events.create_event(actor, draft).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// `GET /events/{id}` — Get an event.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the event does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Get an event",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Event details", body = EventSummary),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let summary = state.events.summary(EventId::from_uuid(id)).await?;
    Ok(Json(summary))
}

/// `GET /events/mine` — Events created by the caller.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] without a caller identity.
#[utoipa::path(
    get,
    path = "/api/v1/events/mine",
    tag = "Events",
    summary = "List my events",
    responses(
        (status = 200, description = "Events owned by the caller, by date", body = Vec<EventSummary>),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
    )
)]
pub async fn list_my_events(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.events.list_owned(actor).await?))
}

/// `GET /groups/{id}/events` — Events associated with a group.
///
/// # Errors
///
/// Returns [`GatewayError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/groups/{id}/events",
    tag = "Events",
    summary = "List a group's events",
    params(
        ("id" = uuid::Uuid, Path, description = "Group UUID"),
    ),
    responses(
        (status = 200, description = "Events of the group, by date", body = Vec<EventSummary>),
    )
)]
pub async fn list_group_events(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.events.list_for_group(GroupId::from_uuid(id)).await?))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event))
        .route("/events/mine", get(list_my_events))
        .route("/events/{id}", get(get_event))
        .route("/groups/{id}/events", get(list_group_events))
}
