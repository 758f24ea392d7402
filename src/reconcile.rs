//! The payment state machine.
//!
//! Lifecycle: `pending -> completed`, `pending -> failed`,
//! `completed -> refunded`. Every transition is a conditional UPDATE keyed
//! on the current status; the affected-row count is the single source of
//! truth for "this call won the transition", and side effects (supporter
//! upsert, earnings increment, notifications) run only on a win. Redelivered
//! gateway events therefore land on a terminal row, affect zero rows, and
//! turn into clean no-ops.
//!
//! Dependent writes run strictly after the payment row commits: the
//! payment's status is the durable signal that an event was handled, so a
//! crash between transition and fan-out leaves a correct ledger and at
//! worst a missing notification.

use chrono::{Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::gateway::{self, GatewayClient};
use crate::models::{CreatePayment, NotificationKind, Payment, PaymentStatus};
use crate::notify;
use crate::validate;

/// Days until the next charge of a recurring membership.
const BILLING_PERIOD_DAYS: i64 = 30;

// ============ Create ============

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    /// Amount in currency minor units.
    pub amount: i64,
    pub currency: String,
    pub creator_id: String,
    #[serde(default)]
    pub is_monthly: bool,
    #[serde(default)]
    pub tier_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Validate the request, open a gateway order, persist a pending payment.
///
/// A gateway timeout or failure leaves nothing persisted; the client can
/// simply retry. The unique `gateway_order_id` constraint means a duplicate
/// gateway response cannot fork payment rows.
pub async fn create_payment(
    state: &AppState,
    user_id: &str,
    request: &CreatePaymentRequest,
) -> Result<Payment> {
    validate::validate_amount(request.amount, state.max_amount_minor)?;
    validate::validate_currency(&request.currency)?;
    validate::validate_creator_id(&request.creator_id)?;
    if let Some(ref tier_id) = request.tier_id {
        validate::validate_tier_id(tier_id)?;
    }
    if let Some(ref message) = request.message {
        validate::validate_message(message)?;
    }

    let conn = state.db.get()?;
    queries::get_creator_by_id(&conn, &request.creator_id)?
        .or_not_found(msg::CREATOR_NOT_FOUND)?;

    // Receipt ties the gateway order back to us in gateway dashboards.
    let receipt = uuid::Uuid::new_v4().to_string();
    let order = state
        .gateway
        .create_order(request.amount, &request.currency, &receipt)
        .await?;

    let payment = queries::create_payment(
        &conn,
        &CreatePayment {
            user_id: user_id.to_string(),
            creator_id: request.creator_id.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            is_monthly: request.is_monthly,
            tier_id: request.tier_id.clone(),
            message: request.message.clone(),
            gateway_order_id: order.id,
        },
    )?;

    tracing::info!(
        payment_id = %payment.id,
        order_id = %payment.gateway_order_id,
        amount = payment.amount,
        "Created pending payment"
    );
    Ok(payment)
}

// ============ Client-submitted verification ============

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub payment_id: String,
    pub gateway_payment_id: String,
    pub gateway_order_id: String,
    pub gateway_signature: String,
}

/// Verify a client-submitted payment confirmation.
///
/// The gateway signs `"{order_id}|{payment_id}"` with the shared API key
/// secret; a mismatch leaves the payment untouched. On a verified match the
/// payment completes and the supporter/earnings fan-out runs exactly once.
pub fn verify_client_payment(
    conn: &Connection,
    gateway_client: &GatewayClient,
    request: &VerifyPaymentRequest,
) -> Result<Payment> {
    let payment = queries::get_payment_by_id(conn, &request.payment_id)?
        .or_not_found(msg::PAYMENT_NOT_FOUND)?;

    if payment.gateway_order_id != request.gateway_order_id {
        return Err(AppError::Validation(
            "gateway_order_id does not match payment".into(),
        ));
    }

    let valid = gateway_client.verify_payment_signature(
        &request.gateway_order_id,
        &request.gateway_payment_id,
        &request.gateway_signature,
    )?;
    if !valid {
        tracing::warn!(payment_id = %payment.id, "Rejected payment verification: bad signature");
        return Err(AppError::InvalidSignature);
    }

    complete_with_fan_out(
        conn,
        &payment,
        Some(&request.gateway_payment_id),
        Some(&request.gateway_signature),
        Utc::now().timestamp(),
    )?;

    queries::get_payment_by_id(conn, &payment.id)?.or_not_found(msg::PAYMENT_NOT_FOUND)
}

// ============ Webhook ingestion ============

/// Gateway webhook events this service consumes. The enum is closed on
/// purpose: an event type we have not modeled fails to parse and comes back
/// as a non-retryable 400 instead of vanishing in a default branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEventKind {
    #[serde(rename = "payment.captured")]
    PaymentCaptured,
    #[serde(rename = "payment.failed")]
    PaymentFailed,
    #[serde(rename = "payment.refunded")]
    PaymentRefunded,
}

/// The gateway's native event envelope. The raw body bytes are verified
/// before this is ever parsed.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub event: WebhookEventKind,
    pub order_id: String,
    #[serde(default)]
    pub gateway_payment_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Unix seconds at which the gateway recorded the capture.
    #[serde(default)]
    pub paid_at: Option<i64>,
}

/// What a webhook call did, for response bodies and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied,
    /// The payment was already in the target state; nothing changed.
    AlreadyProcessed,
}

/// Apply a verified webhook event to the payment it references.
///
/// The payment is looked up by the `gateway_order_id` carried in the
/// envelope; a webhook can only transition an existing payment, never
/// create one.
pub fn apply_webhook_event(conn: &Connection, envelope: &WebhookEnvelope) -> Result<WebhookOutcome> {
    let payment = queries::get_payment_by_order_id(conn, &envelope.order_id)?
        .or_not_found(msg::TRANSACTION_NOT_FOUND)?;

    let paid_at = envelope.paid_at.unwrap_or_else(|| Utc::now().timestamp());

    match envelope.event {
        WebhookEventKind::PaymentCaptured => {
            let applied = complete_with_fan_out(
                conn,
                &payment,
                envelope.gateway_payment_id.as_deref(),
                None,
                paid_at,
            )?;
            Ok(if applied {
                WebhookOutcome::Applied
            } else {
                WebhookOutcome::AlreadyProcessed
            })
        }
        WebhookEventKind::PaymentFailed => {
            if payment.status == PaymentStatus::Failed {
                return Ok(WebhookOutcome::AlreadyProcessed);
            }
            if !queries::fail_payment(conn, &payment.id)? {
                return resolve_zero_rows(conn, &payment.id, PaymentStatus::Failed)
                    .map(|_| WebhookOutcome::AlreadyProcessed);
            }
            tracing::info!(payment_id = %payment.id, "Payment failed");
            notify::notify(
                conn,
                &payment.user_id,
                NotificationKind::PaymentFailed,
                "Payment failed",
                &format!(
                    "Your payment of {} could not be processed.",
                    notify::format_amount(payment.amount, &payment.currency)
                ),
                Some(&serde_json::json!({ "payment_id": payment.id })),
            );
            Ok(WebhookOutcome::Applied)
        }
        WebhookEventKind::PaymentRefunded => {
            if payment.status == PaymentStatus::Refunded {
                return Ok(WebhookOutcome::AlreadyProcessed);
            }
            refund_payment(conn, &payment)?;
            Ok(WebhookOutcome::Applied)
        }
    }
}

// ============ Refund ============

/// `completed -> refunded`. Notifies both parties.
///
/// Deliberately does not deduct from the supporter's `total_contributed`
/// or the creator's `total_earnings`; `refunded_at` keeps the audit trail
/// for offline reconciliation.
pub fn refund_payment(conn: &Connection, payment: &Payment) -> Result<()> {
    if !queries::refund_payment(conn, &payment.id, Utc::now().timestamp())? {
        // Idempotent when already refunded, an error otherwise.
        resolve_zero_rows(conn, &payment.id, PaymentStatus::Refunded)?;
        return Ok(());
    }

    tracing::info!(payment_id = %payment.id, "Payment refunded");
    let amount = notify::format_amount(payment.amount, &payment.currency);
    let data = serde_json::json!({ "payment_id": payment.id, "amount": payment.amount });
    notify::notify(
        conn,
        &payment.user_id,
        NotificationKind::PaymentRefunded,
        "Payment refunded",
        &format!("Your payment of {} has been refunded.", amount),
        Some(&data),
    );
    if let Ok(Some(creator)) = queries::get_creator_by_id(conn, &payment.creator_id) {
        notify::notify(
            conn,
            &creator.user_id,
            NotificationKind::PaymentRefunded,
            "Payment refunded",
            &format!("A payment of {} to you has been refunded.", amount),
            Some(&data),
        );
    }
    Ok(())
}

// ============ Shared transition core ============

/// `pending -> completed` plus the dependent fan-out.
///
/// Returns `Ok(true)` when this call performed the transition, `Ok(false)`
/// when the payment was already completed (idempotent redelivery), and an
/// error for an invalid transition (`failed`/`refunded` cannot complete).
///
/// Fan-out failures after the committed transition are logged and do not
/// fail the call: the ledger favors a correctly recorded payment over fully
/// consistent secondary rows.
fn complete_with_fan_out(
    conn: &Connection,
    payment: &Payment,
    gateway_payment_id: Option<&str>,
    gateway_signature: Option<&str>,
    paid_at: i64,
) -> Result<bool> {
    let applied = queries::complete_payment(
        conn,
        &payment.id,
        gateway_payment_id,
        gateway_signature,
        paid_at,
    )?;

    if !applied {
        // Either a redelivery (already completed) or an invalid transition.
        resolve_zero_rows(conn, &payment.id, PaymentStatus::Completed)?;
        return Ok(false);
    }

    tracing::info!(
        payment_id = %payment.id,
        order_id = %payment.gateway_order_id,
        "Payment completed"
    );

    // Membership fan-out: only recurring payments with a chosen tier
    // establish or refresh a supporter row.
    if payment.is_monthly {
        if let Some(ref tier_id) = payment.tier_id {
            let next_billing = paid_at + Duration::days(BILLING_PERIOD_DAYS).num_seconds();
            match queries::upsert_supporter_active(
                conn,
                &payment.user_id,
                &payment.creator_id,
                Some(tier_id),
                payment.amount,
                paid_at,
                Some(next_billing),
            ) {
                Ok(supporter) => {
                    tracing::info!(
                        supporter_id = %supporter.id,
                        total_contributed = supporter.total_contributed,
                        "Supporter membership upserted"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        payment_id = %payment.id,
                        "Supporter upsert failed after completed payment: {}",
                        e
                    );
                }
            }
        }
    }

    if let Err(e) = queries::increment_creator_earnings(conn, &payment.creator_id, payment.amount)
    {
        tracing::error!(
            creator_id = %payment.creator_id,
            "Earnings increment failed after completed payment: {}",
            e
        );
    }

    let amount = notify::format_amount(payment.amount, &payment.currency);
    let data = serde_json::json!({ "payment_id": payment.id, "amount": payment.amount });
    notify::notify(
        conn,
        &payment.user_id,
        NotificationKind::PaymentConfirmed,
        "Payment successful",
        &format!("Your payment of {} was successful.", amount),
        Some(&data),
    );
    if let Ok(Some(creator)) = queries::get_creator_by_id(conn, &payment.creator_id) {
        let kind = if payment.is_monthly {
            NotificationKind::NewSupporter
        } else {
            NotificationKind::PaymentReceived
        };
        notify::notify(
            conn,
            &creator.user_id,
            kind,
            "Payment received",
            &format!("You received {}.", amount),
            Some(&data),
        );
    }

    Ok(true)
}

/// Resolve a conditional update that affected zero rows: re-read the row
/// and distinguish "already in target state" (a concurrent delivery won;
/// idempotent `Ok`) from a genuine invalid transition (error, row left
/// unchanged).
fn resolve_zero_rows(conn: &Connection, payment_id: &str, target: PaymentStatus) -> Result<()> {
    let current = queries::get_payment_by_id(conn, payment_id)?
        .or_not_found(msg::PAYMENT_NOT_FOUND)?
        .status;
    if current == target {
        return Ok(());
    }
    Err(AppError::Validation(format!(
        "{}: {} -> {}",
        msg::INVALID_TRANSITION,
        current,
        target
    )))
}

/// HMAC verification input for webhook ingestion, resolved per creator.
///
/// The secret is read immediately before verification; a rotation racing an
/// in-flight delivery may still verify against the pre-rotation secret.
pub fn webhook_secret_for_order(conn: &Connection, order_id: &str) -> Result<(Payment, String)> {
    let payment = queries::get_payment_by_order_id(conn, order_id)?
        .or_not_found(msg::TRANSACTION_NOT_FOUND)?;
    let creator = queries::get_creator_by_id(conn, &payment.creator_id)?
        .or_not_found(msg::CREATOR_NOT_FOUND)?;
    let secret = creator
        .webhook_secret
        .ok_or_else(|| AppError::Forbidden(msg::WEBHOOK_NOT_CONFIGURED.to_string()))?;
    Ok((payment, secret))
}

/// Verify a raw webhook body against the creator-scoped secret for the
/// order it references, then apply the event.
pub fn ingest_webhook(
    conn: &Connection,
    raw_body: &[u8],
    signature: &str,
) -> Result<WebhookOutcome> {
    // Parse only to find the order; signature input stays the raw bytes.
    let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
        .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {}", e)))?;

    let (_, secret) = webhook_secret_for_order(conn, &envelope.order_id)?;

    if !gateway::verify_webhook_signature(raw_body, signature, &secret)? {
        tracing::warn!(order_id = %envelope.order_id, "Rejected webhook: bad signature");
        return Err(AppError::InvalidSignature);
    }

    apply_webhook_event(conn, &envelope)
}
