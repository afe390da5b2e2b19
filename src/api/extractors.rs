//! Request extractors shared by the handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::UserId;
use crate::error::GatewayError;

/// Header carrying the caller's user id, set by the upstream gateway after
/// it verified the caller's token.
pub const ACTOR_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub UserId);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| raw.trim().parse::<uuid::Uuid>().ok())
            .map(|uuid| Self(UserId::from(uuid)))
            .ok_or(GatewayError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(header: Option<&str>) -> Result<Actor, GatewayError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(ACTOR_HEADER, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap_or_default().into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn valid_header_yields_actor() {
        let id = uuid::Uuid::new_v4();
        let actor = extract(Some(&id.to_string())).await;
        assert_eq!(actor.ok(), Some(Actor(UserId::from(id))));
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthenticated() {
        assert!(matches!(extract(None).await, Err(GatewayError::Unauthenticated)));
        assert!(matches!(
            extract(Some("not-a-uuid")).await,
            Err(GatewayError::Unauthenticated)
        ));
    }
}
