use serde::{Deserialize, Serialize};

/// User-facing notification row. Append-only; never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    /// Recipient.
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Opaque JSON payload for the client (payment id, amount, ...).
    pub data: Option<serde_json::Value>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PaymentReceived,
    PaymentConfirmed,
    PaymentFailed,
    PaymentRefunded,
    NewSupporter,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentReceived => "payment_received",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::PaymentFailed => "payment_failed",
            Self::PaymentRefunded => "payment_refunded",
            Self::NewSupporter => "new_supporter",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment_received" => Ok(Self::PaymentReceived),
            "payment_confirmed" => Ok(Self::PaymentConfirmed),
            "payment_failed" => Ok(Self::PaymentFailed),
            "payment_refunded" => Ok(Self::PaymentRefunded),
            "new_supporter" => Ok(Self::NewSupporter),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
