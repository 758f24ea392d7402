//! Best-effort notification writes.
//!
//! Notifications sit outside the payment's atomicity boundary: a failed
//! insert is logged and swallowed so it can never re-fail a committed
//! payment transition.

use rusqlite::Connection;

use crate::db::queries;
use crate::models::NotificationKind;

pub fn notify(
    conn: &Connection,
    user_id: &str,
    kind: NotificationKind,
    title: &str,
    message: &str,
    data: Option<&serde_json::Value>,
) {
    if let Err(e) = queries::insert_notification(conn, user_id, kind, title, message, data) {
        tracing::error!(
            user_id,
            kind = kind.as_str(),
            "Failed to insert notification: {}",
            e
        );
    }
}

/// Format minor units for user-facing notification text ("500.00 INR").
pub fn format_amount(amount_minor: i64, currency: &str) -> String {
    format!(
        "{}.{:02} {}",
        amount_minor / 100,
        (amount_minor % 100).abs(),
        currency
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minor_units() {
        assert_eq!(format_amount(50_000, "INR"), "500.00 INR");
        assert_eq!(format_amount(5, "USD"), "0.05 USD");
        assert_eq!(format_amount(100, "EUR"), "1.00 EUR");
    }
}
