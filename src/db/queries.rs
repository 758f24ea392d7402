use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

use super::from_row::{
    query_all, query_one, CREATOR_COLS, NOTIFICATION_COLS, PAYMENT_COLS, SESSION_COLS,
    SUPPORTER_COLS, USER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

// ============ Users & sessions ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let user = User {
        id: gen_id(),
        email: input.email.clone(),
        name: input.name.clone(),
        created_at: now(),
    };
    conn.execute(
        "INSERT INTO users (id, email, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![user.id, user.email, user.name, user.created_at],
    )?;
    Ok(user)
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

/// Insert a bearer session. In production the login flow owns this; the
/// service itself only ever reads sessions.
pub fn create_session(conn: &Connection, user_id: &str, ttl_secs: i64) -> Result<Session> {
    let created_at = now();
    let session = Session {
        token: gen_id(),
        user_id: user_id.to_string(),
        created_at,
        expires_at: created_at + ttl_secs,
    };
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![session.token, session.user_id, session.created_at, session.expires_at],
    )?;
    Ok(session)
}

/// Look up a live session; expired tokens are treated as absent.
pub fn get_session(conn: &Connection, token: &str) -> Result<Option<Session>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM sessions WHERE token = ?1 AND expires_at > ?2",
            SESSION_COLS
        ),
        &[&token, &now()],
    )
}

// ============ Creators ============

pub fn create_creator(conn: &Connection, input: &CreateCreator) -> Result<Creator> {
    let creator = Creator {
        id: gen_id(),
        user_id: input.user_id.clone(),
        display_name: input.display_name.clone(),
        webhook_secret: input.webhook_secret.clone(),
        total_earnings: 0,
        created_at: now(),
    };
    conn.execute(
        "INSERT INTO creators (id, user_id, display_name, webhook_secret, total_earnings, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![
            creator.id,
            creator.user_id,
            creator.display_name,
            creator.webhook_secret,
            creator.created_at
        ],
    )?;
    Ok(creator)
}

pub fn get_creator_by_id(conn: &Connection, id: &str) -> Result<Option<Creator>> {
    query_one(
        conn,
        &format!("SELECT {} FROM creators WHERE id = ?1", CREATOR_COLS),
        &[&id],
    )
}

pub fn set_creator_webhook_secret(
    conn: &Connection,
    creator_id: &str,
    secret: Option<&str>,
) -> Result<bool> {
    let n = conn.execute(
        "UPDATE creators SET webhook_secret = ?1 WHERE id = ?2",
        params![secret, creator_id],
    )?;
    Ok(n > 0)
}

pub fn increment_creator_earnings(conn: &Connection, creator_id: &str, amount: i64) -> Result<()> {
    conn.execute(
        "UPDATE creators SET total_earnings = total_earnings + ?1 WHERE id = ?2",
        params![amount, creator_id],
    )?;
    Ok(())
}

// ============ Payments ============

pub fn create_payment(conn: &Connection, input: &CreatePayment) -> Result<Payment> {
    let payment = Payment {
        id: gen_id(),
        user_id: input.user_id.clone(),
        creator_id: input.creator_id.clone(),
        amount: input.amount,
        currency: input.currency.clone(),
        status: PaymentStatus::Pending,
        is_monthly: input.is_monthly,
        tier_id: input.tier_id.clone(),
        message: input.message.clone(),
        gateway_order_id: input.gateway_order_id.clone(),
        gateway_payment_id: None,
        gateway_signature: None,
        created_at: now(),
        completed_at: None,
        refunded_at: None,
    };
    conn.execute(
        "INSERT INTO payments (id, user_id, creator_id, amount, currency, status, is_monthly,
                               tier_id, message, gateway_order_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, ?8, ?9, ?10)",
        params![
            payment.id,
            payment.user_id,
            payment.creator_id,
            payment.amount,
            payment.currency,
            payment.is_monthly,
            payment.tier_id,
            payment.message,
            payment.gateway_order_id,
            payment.created_at
        ],
    )?;
    Ok(payment)
}

pub fn get_payment_by_id(conn: &Connection, id: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLS),
        &[&id],
    )
}

pub fn get_payment_by_order_id(conn: &Connection, order_id: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE gateway_order_id = ?1",
            PAYMENT_COLS
        ),
        &[&order_id],
    )
}

/// `pending -> completed`. Conditional on the current status so two
/// concurrent deliveries of the same success event race on the database
/// row, and exactly one observes `true` here.
pub fn complete_payment(
    conn: &Connection,
    payment_id: &str,
    gateway_payment_id: Option<&str>,
    gateway_signature: Option<&str>,
    completed_at: i64,
) -> Result<bool> {
    let n = conn.execute(
        "UPDATE payments
         SET status = 'completed',
             gateway_payment_id = COALESCE(?1, gateway_payment_id),
             gateway_signature = COALESCE(?2, gateway_signature),
             completed_at = ?3
         WHERE id = ?4 AND status = 'pending'",
        params![gateway_payment_id, gateway_signature, completed_at, payment_id],
    )?;
    Ok(n > 0)
}

/// `pending -> failed`.
pub fn fail_payment(conn: &Connection, payment_id: &str) -> Result<bool> {
    let n = conn.execute(
        "UPDATE payments SET status = 'failed' WHERE id = ?1 AND status = 'pending'",
        params![payment_id],
    )?;
    Ok(n > 0)
}

/// `completed -> refunded`. Does not touch supporter contribution totals.
pub fn refund_payment(conn: &Connection, payment_id: &str, refunded_at: i64) -> Result<bool> {
    let n = conn.execute(
        "UPDATE payments SET status = 'refunded', refunded_at = ?1
         WHERE id = ?2 AND status = 'completed'",
        params![refunded_at, payment_id],
    )?;
    Ok(n > 0)
}

// ============ Supporters ============

/// Create or refresh the membership row for `(user_id, creator_id)`.
///
/// On conflict the row is reactivated, the contribution accumulates, and the
/// tier follows the latest payment. `next_billing_date` is passed only for
/// recurring payments; one-off contributions leave it untouched.
pub fn upsert_supporter_active(
    conn: &Connection,
    user_id: &str,
    creator_id: &str,
    tier_id: Option<&str>,
    amount: i64,
    paid_at: i64,
    next_billing_date: Option<i64>,
) -> Result<Supporter> {
    conn.execute(
        "INSERT INTO supporters (id, user_id, creator_id, tier_id, status, total_contributed,
                                 last_payment_at, next_billing_date, created_at)
         VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?6, ?7, ?8)
         ON CONFLICT(user_id, creator_id) DO UPDATE SET
             status = 'active',
             tier_id = COALESCE(excluded.tier_id, supporters.tier_id),
             total_contributed = supporters.total_contributed + excluded.total_contributed,
             last_payment_at = excluded.last_payment_at,
             next_billing_date = COALESCE(excluded.next_billing_date, supporters.next_billing_date)",
        params![
            gen_id(),
            user_id,
            creator_id,
            tier_id,
            amount,
            paid_at,
            next_billing_date,
            paid_at
        ],
    )?;
    get_supporter(conn, user_id, creator_id)?
        .ok_or_else(|| crate::error::AppError::Internal("Supporter upsert lost row".into()))
}

pub fn get_supporter(
    conn: &Connection,
    user_id: &str,
    creator_id: &str,
) -> Result<Option<Supporter>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM supporters WHERE user_id = ?1 AND creator_id = ?2",
            SUPPORTER_COLS
        ),
        &[&user_id, &creator_id],
    )
}

// ============ Notifications ============

pub fn insert_notification(
    conn: &Connection,
    user_id: &str,
    kind: NotificationKind,
    title: &str,
    message: &str,
    data: Option<&serde_json::Value>,
) -> Result<Notification> {
    let notification = Notification {
        id: gen_id(),
        user_id: user_id.to_string(),
        kind,
        title: title.to_string(),
        message: message.to_string(),
        data: data.cloned(),
        created_at: now(),
    };
    let data_str = match &notification.data {
        Some(v) => Some(serde_json::to_string(v)?),
        None => None,
    };
    conn.execute(
        "INSERT INTO notifications (id, user_id, kind, title, message, data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            notification.id,
            notification.user_id,
            notification.kind.as_str(),
            notification.title,
            notification.message,
            data_str,
            notification.created_at
        ],
    )?;
    Ok(notification)
}

pub fn list_notifications_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Notification>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM notifications WHERE user_id = ?1 ORDER BY created_at",
            NOTIFICATION_COLS
        ),
        &[&user_id],
    )
}
