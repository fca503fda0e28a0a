//! Principal extraction from gateway-injected identity headers.
//!
//! Token verification happens upstream; by the time a request reaches this
//! service the gateway has already authenticated the caller and injected
//! `x-user-id` and `x-user-roles`. A request without an identity header is
//! rejected before any handler logic runs.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::{AppError, Principal};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::Authentication(format!("Missing {} header", USER_ID_HEADER))
            })?;

        let roles = parts
            .headers
            .get(USER_ROLES_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Principal::new(id, roles))
    }
}
