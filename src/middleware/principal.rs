//! Extractors exposing the gate's `AuthContext` to handlers.

use std::convert::Infallible;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::errors::AppError;
use crate::models::principal::AuthContext;

/// The authenticated caller. Rejects with 401 when the gate left the request anonymous.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or(AppError::Unauthenticated)
    }
}

/// The caller if authenticated, `None` otherwise. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<AuthContext>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybePrincipal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybePrincipal(parts.extensions.get::<AuthContext>().cloned()))
    }
}
