//! Request extractors
//!
//! The service sits behind the user directory, which verifies credentials
//! and forwards the caller's identity in headers. The engine trusts those
//! headers; it never checks credentials itself.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use milkway_types::{Actor, Role};
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the verified actor ID
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Header carrying the verified actor role
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Extracts the verified actor identity from request headers
#[derive(Debug, Clone, Copy)]
pub struct ActorHeader(pub Actor);

impl<S> FromRequestParts<S> for ActorHeader
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or(ApiError::InvalidActor)?;

        let role: Role = parts
            .headers
            .get(ACTOR_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or(ApiError::InvalidActor)?;

        Ok(Self(Actor::new(id, role)))
    }
}
