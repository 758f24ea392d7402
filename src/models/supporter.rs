use serde::{Deserialize, Serialize};

/// Durable relationship between a payer and a creator, established by a
/// completed recurring payment. Keyed by `(user_id, creator_id)`.
///
/// The reconciliation path is the sole writer of `total_contributed` and
/// `next_billing_date`; the dashboard only reads these rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supporter {
    pub id: String,
    pub user_id: String,
    pub creator_id: String,
    pub tier_id: Option<String>,
    pub status: SupporterStatus,
    /// Sum of completed contributions, minor units. Never decreases while
    /// the membership is active (refunds are not deducted here).
    pub total_contributed: i64,
    pub last_payment_at: Option<i64>,
    /// Set only for recurring payments: paid_at + 30 days.
    pub next_billing_date: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupporterStatus {
    Active,
    Cancelled,
}

impl SupporterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for SupporterStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for SupporterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
