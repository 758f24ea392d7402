use serde::{Deserialize, Serialize};

/// A payment flowing from a supporter to a creator via the gateway.
///
/// `gateway_order_id` is assigned at order creation and is unique; the
/// webhook path locates the row through it. `amount` is in currency minor
/// units and never changes after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    /// Paying user.
    pub user_id: String,
    /// Receiving creator.
    pub creator_id: String,
    /// Amount in minor units (e.g. paise for INR).
    pub amount: i64,
    /// ISO 4217 code, 3 uppercase letters.
    pub currency: String,
    pub status: PaymentStatus,
    /// True for recurring (membership) payments.
    pub is_monthly: bool,
    /// Membership tier chosen by the supporter, when any.
    pub tier_id: Option<String>,
    /// Supporter message shown on the creator page.
    pub message: Option<String>,

    // Gateway correlation
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,

    pub created_at: i64,
    pub completed_at: Option<i64>,
    pub refunded_at: Option<i64>,
}

/// Data required to persist a new pending payment.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub user_id: String,
    pub creator_id: String,
    pub amount: i64,
    pub currency: String,
    pub is_monthly: bool,
    pub tier_id: Option<String>,
    pub message: Option<String>,
    pub gateway_order_id: String,
}

/// Payment lifecycle. Valid transitions:
/// `pending -> completed`, `pending -> failed`, `completed -> refunded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    /// The single state a transition to `self` may start from.
    pub fn required_predecessor(&self) -> Option<Self> {
        match self {
            Self::Pending => None,
            Self::Completed | Self::Failed => Some(Self::Pending),
            Self::Refunded => Some(Self::Completed),
        }
    }

    /// Terminal states absorb redelivered events as no-ops.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
