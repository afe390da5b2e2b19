//! Supply handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{patch, post};
use axum::{Json, Router};

use crate::api::extractors::Actor;
use crate::app_state::AppState;
use crate::domain::{EventId, Supply, SupplyDraft, SupplyId, SupplyPatch, SupplyProgress};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /events/{id}/supplies` — Add a supply.
///
/// # Errors
///
/// Returns [`GatewayError`] on invalid input, a wrong event type or a
/// caller who may not manage supplies.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/supplies",
    tag = "Supplies",
    summary = "Add a supply",
    description = "Adds an item to a REGISTRY or POTLUCK event. Allowed for the event owner and the admins of its groups.",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    request_body = SupplyDraft,
    responses(
        (status = 201, description = "Supply created", body = Supply),
        (status = 400, description = "Invalid supply or event type", body = ErrorResponse),
        (status = 403, description = "Caller may not manage supplies", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn create_supply(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
    Json(draft): Json<SupplyDraft>,
) -> Result<impl IntoResponse, GatewayError> {
    let supply = state
        .ledger
        .create_supply(EventId::from_uuid(id), actor, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(supply)))
}

/// `GET /events/{id}/supplies` — Supplies with pledge progress.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the event does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/supplies",
    tag = "Supplies",
    summary = "List supplies",
    description = "Returns every supply of the event with the committed quantity and the rounded fulfillment percentage. Served from cache when fresh.",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Supplies with progress", body = Vec<SupplyProgress>),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn list_supplies(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.ledger.event_supplies(EventId::from_uuid(id)).await?))
}

/// `PATCH /supplies/{id}` — Edit a supply.
///
/// # Errors
///
/// Returns [`GatewayError`] on invalid input or a caller who may not
/// manage supplies.
#[utoipa::path(
    patch,
    path = "/api/v1/supplies/{id}",
    tag = "Supplies",
    summary = "Update a supply",
    params(
        ("id" = uuid::Uuid, Path, description = "Supply UUID"),
    ),
    request_body = SupplyPatch,
    responses(
        (status = 200, description = "Updated supply", body = Supply),
        (status = 400, description = "Invalid field", body = ErrorResponse),
        (status = 403, description = "Caller may not manage supplies", body = ErrorResponse),
        (status = 404, description = "Supply not found", body = ErrorResponse),
    )
)]
pub async fn update_supply(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
    Json(patch): Json<SupplyPatch>,
) -> Result<impl IntoResponse, GatewayError> {
    let supply = state
        .ledger
        .update_supply(SupplyId::from_uuid(id), actor, patch)
        .await?;
    Ok(Json(supply))
}

/// `DELETE /supplies/{id}` — Remove a supply and its contributions.
///
/// # Errors
///
/// Returns [`GatewayError`] if the supply does not exist or the caller may
/// not manage it.
#[utoipa::path(
    delete,
    path = "/api/v1/supplies/{id}",
    tag = "Supplies",
    summary = "Delete a supply",
    params(
        ("id" = uuid::Uuid, Path, description = "Supply UUID"),
    ),
    responses(
        (status = 204, description = "Supply deleted"),
        (status = 403, description = "Caller may not manage supplies", body = ErrorResponse),
        (status = 404, description = "Supply not found", body = ErrorResponse),
    )
)]
pub async fn delete_supply(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    state
        .ledger
        .delete_supply(SupplyId::from_uuid(id), actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Supply routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/{id}/supplies", post(create_supply).get(list_supplies))
        .route("/supplies/{id}", patch(update_supply).delete(delete_supply))
}
