//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupted data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, name, created_at";

pub const SESSION_COLS: &str = "token, user_id, created_at, expires_at";

pub const CREATOR_COLS: &str =
    "id, user_id, display_name, webhook_secret, total_earnings, created_at";

pub const PAYMENT_COLS: &str = "id, user_id, creator_id, amount, currency, status, is_monthly, \
     tier_id, message, gateway_order_id, gateway_payment_id, gateway_signature, \
     created_at, completed_at, refunded_at";

pub const SUPPORTER_COLS: &str = "id, user_id, creator_id, tier_id, status, total_contributed, \
     last_payment_at, next_billing_date, created_at";

pub const NOTIFICATION_COLS: &str = "id, user_id, kind, title, message, data, created_at";

// ============ FromRow implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl FromRow for Session {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Session {
            token: row.get(0)?,
            user_id: row.get(1)?,
            created_at: row.get(2)?,
            expires_at: row.get(3)?,
        })
    }
}

impl FromRow for Creator {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Creator {
            id: row.get(0)?,
            user_id: row.get(1)?,
            display_name: row.get(2)?,
            webhook_secret: row.get(3)?,
            total_earnings: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            id: row.get(0)?,
            user_id: row.get(1)?,
            creator_id: row.get(2)?,
            amount: row.get(3)?,
            currency: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            is_monthly: row.get(6)?,
            tier_id: row.get(7)?,
            message: row.get(8)?,
            gateway_order_id: row.get(9)?,
            gateway_payment_id: row.get(10)?,
            gateway_signature: row.get(11)?,
            created_at: row.get(12)?,
            completed_at: row.get(13)?,
            refunded_at: row.get(14)?,
        })
    }
}

impl FromRow for Supporter {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Supporter {
            id: row.get(0)?,
            user_id: row.get(1)?,
            creator_id: row.get(2)?,
            tier_id: row.get(3)?,
            status: parse_enum(row, 4, "status")?,
            total_contributed: row.get(5)?,
            last_payment_at: row.get(6)?,
            next_billing_date: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for Notification {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let data: Option<String> = row.get(5)?;
        let data = match data {
            Some(s) => Some(serde_json::from_str(&s).map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    5,
                    "data".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?),
            None => None,
        };
        Ok(Notification {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind: parse_enum(row, 2, "kind")?,
            title: row.get(3)?,
            message: row.get(4)?,
            data,
            created_at: row.get(6)?,
        })
    }
}
