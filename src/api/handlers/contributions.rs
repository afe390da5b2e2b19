//! Contribution handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{patch, post};
use axum::{Json, Router};

use crate::api::dto::ContributionResponse;
use crate::api::extractors::Actor;
use crate::app_state::AppState;
use crate::domain::{ContributionDraft, ContributionId, ContributionPatch, SupplyId};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::ContributionEntry;

/// `POST /supplies/{id}/contributions` — Pledge toward a supply.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] when the pledge would push the total
/// past 120 % of the quantity needed.
#[utoipa::path(
    post,
    path = "/api/v1/supplies/{id}/contributions",
    tag = "Contributions",
    summary = "Contribute to a supply",
    description = "Pledges a quantity. Totals up to the quantity needed are accepted silently, totals up to 120 % of it are accepted with a `warning`, anything above is rejected.",
    params(
        ("id" = uuid::Uuid, Path, description = "Supply UUID"),
    ),
    request_body = ContributionDraft,
    responses(
        (status = 201, description = "Contribution stored", body = ContributionResponse),
        (status = 400, description = "Invalid quantity or cap exceeded", body = ErrorResponse),
        (status = 403, description = "Caller is not a participant", body = ErrorResponse),
        (status = 404, description = "Supply not found", body = ErrorResponse),
    )
)]
pub async fn create_contribution(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
    Json(draft): Json<ContributionDraft>,
) -> Result<impl IntoResponse, GatewayError> {
    let stored = state
        .ledger
        .create_contribution(SupplyId::from_uuid(id), actor, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(ContributionResponse::from(stored))))
}

/// `GET /supplies/{id}/contributions` — Pledges toward a supply.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the supply does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/supplies/{id}/contributions",
    tag = "Contributions",
    summary = "List contributions",
    params(
        ("id" = uuid::Uuid, Path, description = "Supply UUID"),
    ),
    responses(
        (status = 200, description = "Contributions with contributor names", body = Vec<ContributionEntry>),
        (status = 404, description = "Supply not found", body = ErrorResponse),
    )
)]
pub async fn list_contributions(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(
        state.ledger.list_contributions(SupplyId::from_uuid(id)).await?,
    ))
}

/// `PATCH /contributions/{id}` — Edit a pledge.
///
/// # Errors
///
/// Returns [`GatewayError`] if the caller did not make the pledge or the new
/// quantity exceeds the cap.
#[utoipa::path(
    patch,
    path = "/api/v1/contributions/{id}",
    tag = "Contributions",
    summary = "Update a contribution",
    params(
        ("id" = uuid::Uuid, Path, description = "Contribution UUID"),
    ),
    request_body = ContributionPatch,
    responses(
        (status = 200, description = "Updated contribution", body = ContributionResponse),
        (status = 400, description = "Invalid quantity or cap exceeded", body = ErrorResponse),
        (status = 403, description = "Caller is not the contributor", body = ErrorResponse),
        (status = 404, description = "Contribution not found", body = ErrorResponse),
    )
)]
pub async fn update_contribution(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
    Json(patch): Json<ContributionPatch>,
) -> Result<impl IntoResponse, GatewayError> {
    let stored = state
        .ledger
        .update_contribution(ContributionId::from_uuid(id), actor, patch)
        .await?;
    Ok(Json(ContributionResponse::from(stored)))
}

/// `DELETE /contributions/{id}` — Withdraw a pledge.
///
/// # Errors
///
/// Returns [`GatewayError`] if the contribution does not exist or the
/// caller did not make it.
#[utoipa::path(
    delete,
    path = "/api/v1/contributions/{id}",
    tag = "Contributions",
    summary = "Delete a contribution",
    params(
        ("id" = uuid::Uuid, Path, description = "Contribution UUID"),
    ),
    responses(
        (status = 204, description = "Contribution deleted"),
        (status = 403, description = "Caller is not the contributor", body = ErrorResponse),
        (status = 404, description = "Contribution not found", body = ErrorResponse),
    )
)]
pub async fn delete_contribution(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    state
        .ledger
        .delete_contribution(ContributionId::from_uuid(id), actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Contribution routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/supplies/{id}/contributions",
            post(create_contribution).get(list_contributions),
        )
        .route(
            "/contributions/{id}",
            patch(update_contribution).delete(delete_contribution),
        )
}
