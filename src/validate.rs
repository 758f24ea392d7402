//! Input validation for payment creation.
//!
//! Everything here runs before any gateway or database call, so a rejected
//! request has no side effects.

use crate::error::{AppError, Result};

/// Longest supporter message stored alongside a payment.
pub const MAX_MESSAGE_LEN: usize = 500;

const MAX_ID_LEN: usize = 64;

fn valid_id(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_ID_LEN
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Amount in minor units: strictly positive and within the configured
/// ceiling.
pub fn validate_amount(amount: i64, ceiling: i64) -> Result<()> {
    if amount <= 0 {
        return Err(AppError::Validation("amount must be positive".into()));
    }
    if amount > ceiling {
        return Err(AppError::Validation(format!(
            "amount exceeds maximum of {} minor units",
            ceiling
        )));
    }
    Ok(())
}

/// ISO 4217: exactly three ASCII uppercase letters.
pub fn validate_currency(currency: &str) -> Result<()> {
    if currency.len() == 3 && currency.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "currency must be a 3-letter uppercase ISO 4217 code".into(),
        ))
    }
}

pub fn validate_creator_id(creator_id: &str) -> Result<()> {
    if valid_id(creator_id) {
        Ok(())
    } else {
        Err(AppError::Validation("invalid creator_id".into()))
    }
}

pub fn validate_tier_id(tier_id: &str) -> Result<()> {
    if valid_id(tier_id) {
        Ok(())
    } else {
        Err(AppError::Validation("invalid tier_id".into()))
    }
}

pub fn validate_message(message: &str) -> Result<()> {
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::Validation(format!(
            "message exceeds {} characters",
            MAX_MESSAGE_LEN
        )));
    }
    Ok(())
}
