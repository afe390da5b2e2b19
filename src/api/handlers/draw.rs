//! Secret-friend draw handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::extractors::Actor;
use crate::app_state::AppState;
use crate::domain::{Assignment, DrawResult, EventId};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /events/{id}/draw` — Run the secret-friend draw.
///
/// # Errors
///
/// Returns [`GatewayError`] when a precondition fails or the shuffle
/// budget is exhausted (retryable).
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/draw",
    tag = "Secret friend",
    summary = "Run the draw",
    description = "Pairs every participant with another one so that nobody draws themselves. A scope can only be drawn once. Error code 1002 means no valid arrangement was found in time and the request may be retried.",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 201, description = "Draw recorded", body = DrawResult),
        (status = 400, description = "Precondition failed or draw exhausted", body = ErrorResponse),
        (status = 403, description = "Caller is not the owner", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn run_draw(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let result = state.matches.draw(EventId::from_uuid(id), actor).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// `GET /events/{id}/assignment` — The caller's own receiver.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the caller has no match.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/assignment",
    tag = "Secret friend",
    summary = "Get my assignment",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Who the caller gives to", body = Assignment),
        (status = 404, description = "No draw or no match for the caller", body = ErrorResponse),
    )
)]
pub async fn get_assignment(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.matches.assignment(EventId::from_uuid(id), actor).await?))
}

/// Draw routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/{id}/draw", post(run_draw))
        .route("/events/{id}/assignment", get(get_assignment))
}
