//! Mapping of [`LoyaltyError`] onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use loyalty_types::LoyaltyError;

/// Handler error: a classified ledger error rendered as its status code.
///
/// Client errors carry their message as a plain-text body. Server errors
/// are logged and answered with a generic body.
#[derive(Debug)]
pub struct ApiError(pub LoyaltyError);

impl From<LoyaltyError> for ApiError {
    fn from(err: LoyaltyError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.0.is_client_error() {
            tracing::debug!(error = %self.0, %status, "request rejected");
            return (status, self.0.to_string()).into_response();
        }
        tracing::error!(error = %self.0, "request failed");
        (status, "internal server error").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_classification() {
        let cases = [
            (LoyaltyError::InvalidOrderNumber("1".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (LoyaltyError::OrderOwnedByAnotherUser("1".into()), StatusCode::CONFLICT),
            (
                LoyaltyError::InsufficientFunds { needed: 2, available: 1 },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (LoyaltyError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (LoyaltyError::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).into_response().status(), expected);
        }
    }
}
