use axum::extract::State;
use serde::Serialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{AuthUser, Json};
use crate::models::Payment;
use crate::rate_limit::{rate_limit_headers, RateLimitClass};
use crate::reconcile::{self, CreatePaymentRequest, VerifyPaymentRequest};

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub payment_id: String,
}

/// `POST /payments/create` — open a gateway order and persist a pending
/// payment. Budgeted per user, not per IP: a single user hammering order
/// creation is the abuse case here.
pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<impl axum::response::IntoResponse> {
    let decision = state
        .limiter
        .enforce(&format!("user:{}", user.user_id), RateLimitClass::Payment)?;

    let payment = reconcile::create_payment(&state, &user.user_id, &request).await?;

    Ok((
        rate_limit_headers(&decision),
        Json(CreatePaymentResponse {
            order_id: payment.gateway_order_id.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            payment_id: payment.id,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub payment: Payment,
}

/// `POST /payments/verify` — client-submitted confirmation carrying the
/// gateway's `order_id|payment_id` signature.
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<impl axum::response::IntoResponse> {
    let decision = state
        .limiter
        .enforce(&format!("user:{}", user.user_id), RateLimitClass::Payment)?;

    let conn = state.db.get()?;
    let payment = reconcile::verify_client_payment(&conn, &state.gateway, &request)?;

    Ok((
        rate_limit_headers(&decision),
        Json(VerifyPaymentResponse {
            success: true,
            payment,
        }),
    ))
}
