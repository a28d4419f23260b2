//! Extractor for the caller attached by the access gate.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::actions::ActionError;
use crate::models::Caller;

/// The authenticated caller of a protected route.
///
/// The gate only forwards protected paths with a valid session, so a missing
/// caller here means a route was mounted outside the gate's tables.
#[derive(Debug, Clone)]
pub struct RequireCaller(pub Caller);

impl<S> FromRequestParts<S> for RequireCaller
where
    S: Send + Sync,
{
    type Rejection = ActionError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                tracing::warn!(path = %parts.uri.path(), "Protected route reached without a caller");
                ActionError::Unauthorized
            })
    }
}

/// The caller, if the request carried a valid session.
#[derive(Debug, Clone)]
pub struct OptionalCaller(pub Option<Caller>);

impl<S> FromRequestParts<S> for OptionalCaller
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Caller>().cloned()))
    }
}
