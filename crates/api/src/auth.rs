//! Caller identity extraction.
//!
//! Credential issuance and verification live with an outer
//! collaborator; by the time a request reaches this service the bearer
//! token IS the verified user id. The extractor only insists the header
//! is present and well-formed.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

/// The authenticated caller, extracted from `Authorization: Bearer <uuid>`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected a Bearer token".to_string()))?;

        let uuid = uuid::Uuid::parse_str(token.trim())
            .map_err(|_| ApiError::Unauthorized("malformed bearer token".to_string()))?;

        Ok(AuthUser(UserId::from_uuid(uuid)))
    }
}
