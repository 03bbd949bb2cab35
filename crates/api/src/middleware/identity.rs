//! Acting-identity extractors.
//!
//! Authentication itself is handled upstream (gateway); requests arrive
//! with the caller's identity in the `x-actor` header and an optional
//! `x-actor-role` header. Identities are normalized here, exactly once,
//! before they reach the engine.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use labrack_core::identity;

use crate::error::AppError;

/// Header carrying the authenticated caller's identity.
const ACTOR_HEADER: &str = "x-actor";

/// Header carrying the caller's role, set by the gateway.
const ROLE_HEADER: &str = "x-actor-role";

/// Role value granting elevated (admin) privileges.
const ROLE_ADMIN: &str = "admin";

/// The authenticated caller, with a normalized identity.
#[derive(Debug, Clone)]
pub struct Actor {
    pub identity: String,
    /// Elevated actors may release/preempt on others' behalf, queue with
    /// priority, and reach the admin surface.
    pub elevated: bool,
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing x-actor header".to_string()))?;

        let identity = identity::normalize(raw)?;

        let elevated = parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|role| role.eq_ignore_ascii_case(ROLE_ADMIN));

        Ok(Actor { identity, elevated })
    }
}

/// Extractor that additionally requires the admin role.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Actor);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let actor = Actor::from_request_parts(parts, state).await?;
        if !actor.elevated {
            return Err(labrack_core::error::CoreError::PermissionDenied(
                "Admin role required".to_string(),
            )
            .into());
        }
        Ok(RequireAdmin(actor))
    }
}
