//! Test utilities and fixtures for tipjar integration tests

#![allow(dead_code)]

use hmac::{Hmac, Mac};
use rusqlite::Connection;
use sha2::Sha256;

pub use tipjar::db::{init_db, queries};
pub use tipjar::models::*;

type HmacSha256 = Hmac<Sha256>;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

pub fn create_test_user(conn: &Connection, email: &str) -> User {
    queries::create_user(
        conn,
        &CreateUser {
            email: email.to_string(),
            name: format!("Test User {}", email),
        },
    )
    .expect("Failed to create test user")
}

/// Create a creator (and its backing user) with an optional webhook secret
pub fn create_test_creator(conn: &Connection, webhook_secret: Option<&str>) -> Creator {
    let user = create_test_user(conn, &format!("creator-{}@test.local", uuid::Uuid::new_v4()));
    queries::create_creator(
        conn,
        &CreateCreator {
            user_id: user.id,
            display_name: "Test Creator".to_string(),
            webhook_secret: webhook_secret.map(|s| s.to_string()),
        },
    )
    .expect("Failed to create test creator")
}

/// Persist a pending payment with a fixed gateway order id
pub fn create_test_payment(
    conn: &Connection,
    user: &User,
    creator: &Creator,
    amount: i64,
    is_monthly: bool,
    tier_id: Option<&str>,
    order_id: &str,
) -> Payment {
    queries::create_payment(
        conn,
        &CreatePayment {
            user_id: user.id.clone(),
            creator_id: creator.id.clone(),
            amount,
            currency: "INR".to_string(),
            is_monthly,
            tier_id: tier_id.map(|s| s.to_string()),
            message: None,
            gateway_order_id: order_id.to_string(),
        },
    )
    .expect("Failed to create test payment")
}

/// HMAC-SHA256 hex signature, as the gateway would compute it
pub fn sign(payload: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// A `payment.captured` envelope as raw bytes
pub fn captured_body(order_id: &str, amount: i64, paid_at: i64) -> Vec<u8> {
    serde_json::json!({
        "event": "payment.captured",
        "order_id": order_id,
        "gateway_payment_id": format!("pay_{}", order_id),
        "amount": amount,
        "currency": "INR",
        "paid_at": paid_at,
    })
    .to_string()
    .into_bytes()
}

pub fn failed_body(order_id: &str) -> Vec<u8> {
    serde_json::json!({
        "event": "payment.failed",
        "order_id": order_id,
    })
    .to_string()
    .into_bytes()
}

pub fn refunded_body(order_id: &str) -> Vec<u8> {
    serde_json::json!({
        "event": "payment.refunded",
        "order_id": order_id,
    })
    .to_string()
    .into_bytes()
}
