//! Tipjar - creator-monetization payment backend
//!
//! The core of the service is payment intake, verification, and
//! reconciliation: creating gateway orders, verifying client-submitted
//! confirmations, ingesting asynchronous webhooks idempotently, and fanning
//! out to supporter memberships and notifications.

pub mod config;
pub mod csrf;
pub mod db;
pub mod error;
pub mod extractors;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod rate_limit;
pub mod reconcile;
pub mod validate;
