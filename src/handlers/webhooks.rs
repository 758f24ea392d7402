use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::HeaderMap,
};
use serde::Serialize;
use std::net::SocketAddr;

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::rate_limit::{rate_limit_headers, RateLimitClass};
use crate::reconcile::{self, WebhookOutcome};

/// Header carrying the hex HMAC of the raw body. The envelope itself cannot
/// hold its own signature.
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub status: &'static str,
}

/// `POST /payments/webhook` — gateway server-to-server delivery.
///
/// No CSRF check (not browser-originated) and no session auth; the raw-body
/// HMAC against the creator-scoped secret is the authentication. The body
/// must be taken as raw bytes -- the `Bytes` extractor hands us exactly what
/// the gateway signed, before any JSON parsing.
pub async fn handle_webhook(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl axum::response::IntoResponse> {
    let decision = state
        .limiter
        .enforce(&format!("ip:{}", addr.ip()), RateLimitClass::Webhook)?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation(format!("Missing {} header", SIGNATURE_HEADER)))?
        .to_string();

    let conn = state.db.get()?;
    let outcome = reconcile::ingest_webhook(&conn, &body, &signature)?;

    if outcome == WebhookOutcome::AlreadyProcessed {
        tracing::debug!("Webhook redelivery ignored");
    }

    Ok((
        rate_limit_headers(&decision),
        Json(WebhookResponse {
            success: true,
            status: "processed",
        }),
    ))
}
