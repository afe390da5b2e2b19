//! Gift suggestion handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::extractors::Actor;
use crate::app_state::AppState;
use crate::domain::{EventId, Gift, GiftDraft, GiftList};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /gifts` — Suggest a gift for one or more events.
///
/// # Errors
///
/// Returns [`GatewayError`] on validation failure, unknown events or a
/// caller who may not add gifts to one of the events.
#[utoipa::path(
    post,
    path = "/api/v1/gifts",
    tag = "Gifts",
    summary = "Suggest a gift",
    description = "In a SECRET_FRIEND event any participant may suggest gifts for themselves; in other events only the owner may.",
    request_body = GiftDraft,
    responses(
        (status = 201, description = "Gift stored", body = Gift),
        (status = 400, description = "Validation error or unknown event", body = ErrorResponse),
        (status = 403, description = "Caller may not add gifts", body = ErrorResponse),
    )
)]
pub async fn create_gift(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(draft): Json<GiftDraft>,
) -> Result<impl IntoResponse, GatewayError> {
    let gift = state.gifts.create_gift(actor, draft).await?;
    Ok((StatusCode::CREATED, Json(gift)))
}

/// `GET /events/{id}/gifts` — Gifts the caller can choose from.
///
/// # Errors
///
/// Returns [`GatewayError::Forbidden`] in a `SECRET_FRIEND` event when the
/// caller has no receiver yet.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/gifts",
    tag = "Gifts",
    summary = "List gifts for me",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Visible gifts", body = GiftList),
        (status = 400, description = "Secret-friend event without a group", body = ErrorResponse),
        (status = 403, description = "No receiver assigned to the caller", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn list_gifts(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(
        state
            .gifts
            .list_for_event(EventId::from_uuid(id), actor)
            .await?,
    ))
}

/// Gift routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/gifts", post(create_gift))
        .route("/events/{id}/gifts", get(list_gifts))
}
