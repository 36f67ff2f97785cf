//! Route handlers.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use loyalty_ingress::SubmitOutcome;
use loyalty_types::LoyaltyError;

use crate::{
    dto::{BalanceView, OrderView, WithdrawRequest, WithdrawalView},
    error::ApiError,
    identity::CurrentUser,
    state::AppState,
};

/// `POST /api/user/orders` with the order number as a text body.
pub async fn submit_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: String,
) -> Result<StatusCode, ApiError> {
    let number = body.trim().to_string();
    if number.is_empty() {
        return Err(LoyaltyError::Validation {
            reason: "order number is required".into(),
        }
        .into());
    }

    let outcome = state.run(move |s| s.submissions.submit(user, &number)).await?;
    Ok(match outcome {
        SubmitOutcome::Accepted(_) => StatusCode::ACCEPTED,
        SubmitOutcome::AlreadyRegistered => StatusCode::OK,
    })
}

/// `GET /api/user/orders`.
pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, ApiError> {
    let orders = state.run(move |s| s.history.orders(user)).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let views: Vec<OrderView> = orders.iter().map(OrderView::from).collect();
    Ok(Json(views).into_response())
}

/// `GET /api/user/balance`.
pub async fn get_balance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<BalanceView>, ApiError> {
    let snapshot = state.run(move |s| s.balances.balance(user)).await?;
    Ok(Json(snapshot.into()))
}

/// `POST /api/user/balance/withdraw` with `{"order": "...", "sum": 12.5}`.
///
/// The body is parsed by hand so malformed JSON is `400`; `422` stays
/// reserved for order numbers that fail the Luhn check.
pub async fn withdraw(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: WithdrawRequest = serde_json::from_slice(&body).map_err(|e| LoyaltyError::Validation {
        reason: format!("malformed withdrawal request: {e}"),
    })?;

    state
        .run(move |s| s.withdrawals.withdraw(user, &request.order, request.sum))
        .await?;
    Ok(StatusCode::OK)
}

/// `GET /api/user/withdrawals`.
pub async fn list_withdrawals(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, ApiError> {
    let withdrawals = state.run(move |s| s.history.withdrawals(user)).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let views: Vec<WithdrawalView> = withdrawals.iter().map(WithdrawalView::from).collect();
    Ok(Json(views).into_response())
}
