use serde::{Deserialize, Serialize};

/// Minimal user identity. The OAuth login flow lives outside this service;
/// it writes `users` and `sessions` rows that the payment endpoints consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
}

/// Bearer-token session issued by the (external) login flow.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub created_at: i64,
    pub expires_at: i64,
}
