//! Client-submitted payment verification (`order_id|payment_id` signatures)

mod common;

use common::*;
use tipjar::error::AppError;
use tipjar::gateway::GatewayClient;
use tipjar::reconcile::{self, VerifyPaymentRequest};

const KEY_SECRET: &str = "gateway_key_secret";

fn test_gateway() -> GatewayClient {
    GatewayClient::new("https://gateway.test", "gateway_key_id", KEY_SECRET)
}

fn verify_request(payment: &Payment, signature: &str) -> VerifyPaymentRequest {
    VerifyPaymentRequest {
        payment_id: payment.id.clone(),
        gateway_payment_id: "pay_123".to_string(),
        gateway_order_id: payment.gateway_order_id.clone(),
        gateway_signature: signature.to_string(),
    }
}

fn valid_signature(payment: &Payment) -> String {
    sign(
        format!("{}|pay_123", payment.gateway_order_id).as_bytes(),
        KEY_SECRET,
    )
}

#[test]
fn valid_signature_completes_payment() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    let payment = create_test_payment(&conn, &user, &creator, 50_000, false, None, "order_1");

    let request = verify_request(&payment, &valid_signature(&payment));
    let verified = reconcile::verify_client_payment(&conn, &test_gateway(), &request).unwrap();

    assert_eq!(verified.status, PaymentStatus::Completed);
    assert_eq!(verified.gateway_payment_id.as_deref(), Some("pay_123"));
    assert!(verified.completed_at.is_some());

    // earnings-increment side effect of the verify path
    let creator = queries::get_creator_by_id(&conn, &creator.id).unwrap().unwrap();
    assert_eq!(creator.total_earnings, 50_000);
}

#[test]
fn monthly_verification_upserts_membership() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    let payment = create_test_payment(&conn, &user, &creator, 20_000, true, Some("T1"), "order_1");

    let request = verify_request(&payment, &valid_signature(&payment));
    reconcile::verify_client_payment(&conn, &test_gateway(), &request).unwrap();

    let supporter = queries::get_supporter(&conn, &user.id, &creator.id).unwrap().unwrap();
    assert_eq!(supporter.status, SupporterStatus::Active);
    assert_eq!(supporter.tier_id.as_deref(), Some("T1"));
}

#[test]
fn bad_signature_leaves_payment_untouched() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    let payment = create_test_payment(&conn, &user, &creator, 50_000, true, Some("T1"), "order_1");

    let request = verify_request(&payment, "0".repeat(64).as_str());
    let err = reconcile::verify_client_payment(&conn, &test_gateway(), &request).unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature));

    let payment = queries::get_payment_by_id(&conn, &payment.id).unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(queries::get_supporter(&conn, &user.id, &creator.id).unwrap().is_none());
}

#[test]
fn mismatched_order_id_rejected_before_signature_check() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    let payment = create_test_payment(&conn, &user, &creator, 50_000, false, None, "order_1");

    let mut request = verify_request(&payment, &valid_signature(&payment));
    request.gateway_order_id = "order_2".to_string();

    let err = reconcile::verify_client_payment(&conn, &test_gateway(), &request).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[test]
fn unknown_payment_id_is_not_found() {
    let conn = setup_test_db();
    let request = VerifyPaymentRequest {
        payment_id: "missing".to_string(),
        gateway_payment_id: "pay_123".to_string(),
        gateway_order_id: "order_1".to_string(),
        gateway_signature: "sig".to_string(),
    };
    let err = reconcile::verify_client_payment(&conn, &test_gateway(), &request).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn verify_after_webhook_is_idempotent() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, Some("whsec"));
    let user = create_test_user(&conn, "payer@test.local");
    let payment = create_test_payment(&conn, &user, &creator, 20_000, true, Some("T1"), "order_1");

    // webhook lands first
    let body = captured_body("order_1", 20_000, 1_700_000_000);
    reconcile::ingest_webhook(&conn, &body, &sign(&body, "whsec")).unwrap();

    // then the client submits its confirmation for the same order
    let request = verify_request(&payment, &valid_signature(&payment));
    let verified = reconcile::verify_client_payment(&conn, &test_gateway(), &request).unwrap();
    assert_eq!(verified.status, PaymentStatus::Completed);

    // side effects were not applied twice
    let supporter = queries::get_supporter(&conn, &user.id, &creator.id).unwrap().unwrap();
    assert_eq!(supporter.total_contributed, 20_000);
    let creator = queries::get_creator_by_id(&conn, &creator.id).unwrap().unwrap();
    assert_eq!(creator.total_earnings, 20_000);
}
