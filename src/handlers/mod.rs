pub mod payments;
pub mod webhooks;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use serde::Serialize;

use crate::csrf::origin_guard_middleware;
use crate::db::AppState;
use crate::extractors::Json;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Browser-facing payment routes: session auth + origin guard + per-user
/// rate limiting (the latter two inside the handlers/extractors).
fn payment_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/payments/create", post(payments::create_payment))
        .route("/payments/verify", post(payments::verify_payment))
        .layer(middleware::from_fn_with_state(state, origin_guard_middleware))
}

/// Gateway-facing routes: signature auth only, no origin guard.
fn webhook_router() -> Router<AppState> {
    Router::new().route("/payments/webhook", post(webhooks::handle_webhook))
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(payment_router(state))
        .merge(webhook_router())
}
