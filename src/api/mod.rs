//! REST API layer: route handlers, DTOs, extractors and router composition.
//!
//! All resource endpoints are mounted under `/api/v1`; `/health` sits at the
//! root. With the `swagger-ui` feature the OpenAPI document is served at
//! `/api-docs/openapi.json` and browsable under `/swagger-ui`.

pub mod dto;
pub mod extractors;
pub mod handlers;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document covering every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "gather-gateway",
        description = "Shared social events: secret-friend draws, gift lists and pooled supply ledgers."
    ),
    paths(
        handlers::system::health_handler,
        handlers::events::create_event,
        handlers::events::get_event,
        handlers::events::list_my_events,
        handlers::events::list_group_events,
        handlers::participants::replace_participants,
        handlers::participants::list_participants,
        handlers::draw::run_draw,
        handlers::draw::get_assignment,
        handlers::supplies::create_supply,
        handlers::supplies::list_supplies,
        handlers::supplies::update_supply,
        handlers::supplies::delete_supply,
        handlers::contributions::create_contribution,
        handlers::contributions::list_contributions,
        handlers::contributions::update_contribution,
        handlers::contributions::delete_contribution,
        handlers::gifts::create_gift,
        handlers::gifts::list_gifts,
    ),
    tags(
        (name = "System", description = "Liveness"),
        (name = "Events", description = "Event lookup and creation"),
        (name = "Participants", description = "Event registrations"),
        (name = "Secret friend", description = "Random gift pairing"),
        (name = "Supplies", description = "Items an event needs"),
        (name = "Contributions", description = "Pledges toward supplies"),
        (name = "Gifts", description = "Gift suggestions per event"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the servable application: routes, middleware and state.
pub fn build_app(state: AppState) -> Router {
    let router = build_router();

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::GatewayConfig;
    use crate::domain::{EventBus, ThreadRandom, UserId};
    use crate::persistence::MemoryStore;

    fn app() -> Router {
        build_app(AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new()),
            Arc::new(EventBus::new(8)),
            Arc::new(ThreadRandom),
            &GatewayConfig::default(),
        ))
    }

    async fn status_of(request: Request<Body>) -> StatusCode {
        let Ok(response) = app().oneshot(request).await else {
            panic!("router is infallible");
        };
        response.status()
    }

    #[tokio::test]
    async fn caller_header_gates_resource_routes() {
        let Ok(anonymous) = Request::get("/api/v1/events/mine").body(Body::empty()) else {
            panic!("request");
        };
        assert_eq!(status_of(anonymous).await, StatusCode::UNAUTHORIZED);

        let Ok(known) = Request::get("/api/v1/events/mine")
            .header(extractors::ACTOR_HEADER, UserId::new().to_string())
            .body(Body::empty())
        else {
            panic!("request");
        };
        assert_eq!(status_of(known).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let path = format!("/api/v1/events/{}/participants", uuid::Uuid::new_v4());
        let Ok(request) = Request::get(path).body(Body::empty()) else {
            panic!("request");
        };
        assert_eq!(status_of(request).await, StatusCode::NOT_FOUND);
    }

    #[test]
    fn openapi_lists_every_resource_path() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/v1/events",
            "/api/v1/events/{id}/draw",
            "/api/v1/events/{id}/supplies",
            "/api/v1/supplies/{id}/contributions",
            "/api/v1/contributions/{id}",
            "/api/v1/gifts",
            "/api/v1/events/{id}/gifts",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
