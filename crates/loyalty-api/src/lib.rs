//! # loyalty-api
//!
//! **HTTP boundary**: the user-facing routes over the request plane.
//!
//! ## Routes
//!
//! | Method | Path | Success | Errors |
//! |--------|------|---------|--------|
//! | `POST` | `/api/user/orders` | 202 new, 200 already yours | 400, 401, 409, 422 |
//! | `GET` | `/api/user/orders` | 200, 204 if none | 401 |
//! | `GET` | `/api/user/balance` | 200 | 401 |
//! | `POST` | `/api/user/balance/withdraw` | 200 | 400, 401, 402, 422 |
//! | `GET` | `/api/user/withdrawals` | 200, 204 if none | 401 |
//!
//! Identity comes from the `X-User-Id` header set by the authenticating
//! gateway in front of this service; see [`identity`].
//!
//! Ledger calls are synchronous and run on the blocking pool.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};

pub use error::ApiError;
pub use identity::CurrentUser;
pub use state::AppState;

/// Build the router with all user routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/user/orders",
            post(handlers::submit_order).get(handlers::list_orders),
        )
        .route("/api/user/balance", get(handlers::get_balance))
        .route("/api/user/balance/withdraw", post(handlers::withdraw))
        .route("/api/user/withdrawals", get(handlers::list_withdrawals))
        .with_state(state)
}
