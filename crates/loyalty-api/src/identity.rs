//! Request identity.
//!
//! Password hashing and token verification happen in the gateway in front
//! of this service. It forwards the verified user id in `X-User-Id`; a
//! missing, malformed, or non-positive value is `401`.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use loyalty_types::{constants::USER_ID_HEADER, LoyaltyError, UserId};

use crate::error::ApiError;

/// The authenticated user of the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

impl CurrentUser {
    fn from_parts(parts: &Parts) -> Option<Self> {
        let raw = parts.headers.get(USER_ID_HEADER)?.to_str().ok()?;
        let id: UserId = raw.parse().ok()?;
        (id.get() > 0).then_some(Self(id))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_parts(parts).ok_or(ApiError(LoyaltyError::Unauthenticated))
    }
}
