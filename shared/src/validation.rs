//! Validation utilities for ledger requests

use chrono::NaiveDate;

/// Longest accepted item identifier
pub const MAX_ITEM_ID_LEN: usize = 64;

/// Longest accepted free-text reason or damage description
pub const MAX_REASON_LEN: usize = 200;

/// Validate that a stock quantity is a positive integer
pub fn validate_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be a positive integer");
    }
    Ok(())
}

/// Validate an external item identifier
pub fn validate_item_id(item_id: &str) -> Result<(), &'static str> {
    if item_id.trim().is_empty() {
        return Err("Item id is required");
    }
    if item_id.len() > MAX_ITEM_ID_LEN {
        return Err("Item id must be at most 64 characters");
    }
    if item_id.chars().any(char::is_whitespace) {
        return Err("Item id must not contain whitespace");
    }
    Ok(())
}

/// Validate and normalise the free-text damage description
pub fn validate_damage_reason(damage_reason: Option<&str>) -> Result<String, &'static str> {
    match damage_reason.map(str::trim) {
        Some(text) if text.chars().count() > MAX_REASON_LEN => {
            Err("Damage description must be at most 200 characters")
        }
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err("A damage description is required for damage stock-outs"),
    }
}

/// Validate that a date filter does not end before it starts
pub fn validate_date_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(), &'static str> {
    match (from, to) {
        (Some(f), Some(t)) if f > t => Err("date_from must not be after date_to"),
        _ => Ok(()),
    }
}
