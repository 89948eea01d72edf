use rusqlite::Connection;

use crate::error::Result;

/// Description phrases that mark a statement row as a card payment rather
/// than an expense.
const PAYMENT_PHRASES: &[&str] = &[
    "ONLINE PAYMENT",
    "THANK YOU",
    "PAYMENT RECEIVED",
    "AUTOPAY",
    "AUTOMATIC PAYMENT",
];

/// True when a non-empty reference id has already been imported. Reference
/// ids are issuer-assigned and globally unique; a missing reference never
/// counts as a duplicate. A storage failure propagates rather than
/// guessing "not a duplicate".
pub fn is_duplicate_reference(conn: &Connection, reference: &str) -> Result<bool> {
    if reference.is_empty() {
        return Ok(false);
    }
    let mut stmt = conn.prepare_cached("SELECT 1 FROM transactions WHERE reference = ?1")?;
    Ok(stmt.exists([reference])?)
}

/// True for rows that must never enter the review queue: payments
/// recognized by description, and any credit (negative amount).
pub fn is_excluded(description: &str, amount: f64) -> bool {
    let upper = description.to_uppercase();
    if PAYMENT_PHRASES.iter().any(|p| upper.contains(p)) {
        return true;
    }
    amount < 0.0
}
