//! Payment lifecycle transition tests

mod common;

use common::*;
use tipjar::error::AppError;
use tipjar::reconcile::{self, WebhookEnvelope, WebhookEventKind, WebhookOutcome};

fn envelope(order_id: &str, event: WebhookEventKind) -> WebhookEnvelope {
    WebhookEnvelope {
        event,
        order_id: order_id.to_string(),
        gateway_payment_id: Some(format!("pay_{}", order_id)),
        amount: None,
        currency: None,
        paid_at: Some(1_700_000_000),
    }
}

#[test]
fn captured_completes_pending_payment() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    let payment = create_test_payment(&conn, &user, &creator, 50_000, false, None, "order_1");

    let outcome =
        reconcile::apply_webhook_event(&conn, &envelope("order_1", WebhookEventKind::PaymentCaptured))
            .unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied);

    let payment = queries::get_payment_by_id(&conn, &payment.id).unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.completed_at, Some(1_700_000_000));
    assert_eq!(payment.gateway_payment_id.as_deref(), Some("pay_order_1"));
}

#[test]
fn failed_marks_pending_payment_failed() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    let payment = create_test_payment(&conn, &user, &creator, 50_000, false, None, "order_1");

    let outcome =
        reconcile::apply_webhook_event(&conn, &envelope("order_1", WebhookEventKind::PaymentFailed))
            .unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied);

    let payment = queries::get_payment_by_id(&conn, &payment.id).unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    // payer is told the payment failed
    let notifications = queries::list_notifications_for_user(&conn, &user.id).unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::PaymentFailed);
}

#[test]
fn completed_payment_cannot_fail() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    let payment = create_test_payment(&conn, &user, &creator, 50_000, false, None, "order_1");

    reconcile::apply_webhook_event(&conn, &envelope("order_1", WebhookEventKind::PaymentCaptured))
        .unwrap();

    let err =
        reconcile::apply_webhook_event(&conn, &envelope("order_1", WebhookEventKind::PaymentFailed))
            .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // record unchanged
    let payment = queries::get_payment_by_id(&conn, &payment.id).unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
}

#[test]
fn failed_payment_cannot_complete() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    let payment = create_test_payment(&conn, &user, &creator, 50_000, true, Some("T1"), "order_1");

    reconcile::apply_webhook_event(&conn, &envelope("order_1", WebhookEventKind::PaymentFailed))
        .unwrap();

    let err = reconcile::apply_webhook_event(
        &conn,
        &envelope("order_1", WebhookEventKind::PaymentCaptured),
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let payment = queries::get_payment_by_id(&conn, &payment.id).unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    // the invalid completion must not have created a membership
    assert!(queries::get_supporter(&conn, &user.id, &creator.id).unwrap().is_none());
}

#[test]
fn refunded_payment_cannot_complete_again() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    create_test_payment(&conn, &user, &creator, 50_000, false, None, "order_1");

    reconcile::apply_webhook_event(&conn, &envelope("order_1", WebhookEventKind::PaymentCaptured))
        .unwrap();
    reconcile::apply_webhook_event(&conn, &envelope("order_1", WebhookEventKind::PaymentRefunded))
        .unwrap();

    let err = reconcile::apply_webhook_event(
        &conn,
        &envelope("order_1", WebhookEventKind::PaymentCaptured),
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[test]
fn pending_payment_cannot_refund() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    let payment = create_test_payment(&conn, &user, &creator, 50_000, false, None, "order_1");

    let err = reconcile::apply_webhook_event(
        &conn,
        &envelope("order_1", WebhookEventKind::PaymentRefunded),
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let payment = queries::get_payment_by_id(&conn, &payment.id).unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
}

#[test]
fn refund_keeps_contribution_total() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    create_test_payment(&conn, &user, &creator, 50_000, true, Some("T1"), "order_1");

    reconcile::apply_webhook_event(&conn, &envelope("order_1", WebhookEventKind::PaymentCaptured))
        .unwrap();
    let before = queries::get_supporter(&conn, &user.id, &creator.id)
        .unwrap()
        .unwrap()
        .total_contributed;

    reconcile::apply_webhook_event(&conn, &envelope("order_1", WebhookEventKind::PaymentRefunded))
        .unwrap();

    // refunds are not deducted from the membership ledger
    let after = queries::get_supporter(&conn, &user.id, &creator.id)
        .unwrap()
        .unwrap()
        .total_contributed;
    assert_eq!(before, after);

    // both parties are notified of the refund
    let payer_notifications = queries::list_notifications_for_user(&conn, &user.id).unwrap();
    assert!(payer_notifications
        .iter()
        .any(|n| n.kind == NotificationKind::PaymentRefunded));
}

#[test]
fn monthly_payment_sets_next_billing_thirty_days_out() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    create_test_payment(&conn, &user, &creator, 50_000, true, Some("T1"), "order_1");

    reconcile::apply_webhook_event(&conn, &envelope("order_1", WebhookEventKind::PaymentCaptured))
        .unwrap();

    let supporter = queries::get_supporter(&conn, &user.id, &creator.id).unwrap().unwrap();
    assert_eq!(supporter.status, SupporterStatus::Active);
    assert_eq!(supporter.last_payment_at, Some(1_700_000_000));
    assert_eq!(
        supporter.next_billing_date,
        Some(1_700_000_000 + 30 * 86_400)
    );
}

#[test]
fn completion_increments_creator_earnings() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    create_test_payment(&conn, &user, &creator, 50_000, false, None, "order_1");

    reconcile::apply_webhook_event(&conn, &envelope("order_1", WebhookEventKind::PaymentCaptured))
        .unwrap();

    let creator = queries::get_creator_by_id(&conn, &creator.id).unwrap().unwrap();
    assert_eq!(creator.total_earnings, 50_000);
}

#[test]
fn amount_is_immutable_after_creation() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    let payment = create_test_payment(&conn, &user, &creator, 50_000, false, None, "order_1");

    reconcile::apply_webhook_event(&conn, &envelope("order_1", WebhookEventKind::PaymentCaptured))
        .unwrap();

    let after = queries::get_payment_by_id(&conn, &payment.id).unwrap().unwrap();
    assert_eq!(after.amount, 50_000);
    assert_eq!(after.currency, "INR");
}

#[test]
fn duplicate_order_id_rejected_by_unique_constraint() {
    let conn = setup_test_db();
    let creator = create_test_creator(&conn, None);
    let user = create_test_user(&conn, "payer@test.local");
    create_test_payment(&conn, &user, &creator, 50_000, false, None, "order_1");

    let result = queries::create_payment(
        &conn,
        &CreatePayment {
            user_id: user.id.clone(),
            creator_id: creator.id.clone(),
            amount: 10_000,
            currency: "INR".to_string(),
            is_monthly: false,
            tier_id: None,
            message: None,
            gateway_order_id: "order_1".to_string(),
        },
    );
    assert!(result.is_err());
}
