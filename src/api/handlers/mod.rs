//! REST endpoint handlers organized by resource.

pub mod contributions;
pub mod draw;
pub mod events;
pub mod gifts;
pub mod participants;
pub mod supplies;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(events::routes())
        .merge(participants::routes())
        .merge(draw::routes())
        .merge(supplies::routes())
        .merge(contributions::routes())
        .merge(gifts::routes())
}
