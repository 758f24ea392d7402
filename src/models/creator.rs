use serde::{Deserialize, Serialize};

/// Creator settings read by the reconciliation path.
///
/// `webhook_secret` is per-creator: the gateway signs webhook deliveries for
/// this creator's payments with it. It is looked up fresh on every webhook
/// call; a delivery racing a secret rotation may still verify against the
/// pre-rotation value (recorded limitation, not silently resolved).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creator {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub webhook_secret: Option<String>,
    /// Aggregate completed revenue, minor units.
    pub total_earnings: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCreator {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub webhook_secret: Option<String>,
}
