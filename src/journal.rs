use chrono::Local;
use rusqlite::Connection;

use crate::error::{CardpostError, Result};
use crate::models::{JournalEntry, JournalLine, Split, Transaction};
use crate::settings::Settings;

pub fn round2(val: f64) -> f64 {
    (val * 100.0).round() / 100.0
}

fn cents(val: f64) -> i64 {
    (val * 100.0).round() as i64
}

/// Build a balanced journal entry from an approved transaction. Pure
/// validation + construction over the transaction's current field values;
/// called exactly once per posting attempt and never retried internally.
pub fn build(
    conn: &Connection,
    txn: &Transaction,
    splits: &[Split],
    settings: &Settings,
) -> Result<JournalEntry> {
    let liability = txn
        .card_account
        .clone()
        .filter(|a| !a.is_empty())
        .or_else(|| Some(settings.liability_account.clone()).filter(|a| !a.is_empty()))
        .ok_or_else(|| {
            CardpostError::Configuration(
                "Card liability account not set on transaction and no default configured"
                    .to_string(),
            )
        })?;

    let expense = txn
        .expense_account
        .clone()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| CardpostError::Validation("Expense account is required".to_string()))?;

    if settings.require_vendor_for_posting && txn.vendor.is_none() {
        return Err(CardpostError::Validation(
            "Vendor is required for posting".to_string(),
        ));
    }

    let party = if account_requires_party(conn, &liability)? {
        Some(resolve_party(conn, txn, settings)?)
    } else {
        None
    };

    let total = round2(txn.amount.abs());
    let mut lines = Vec::new();

    if !splits.is_empty() {
        // The credit side carries the first split's cost center and tag.
        let first = &splits[0];
        lines.push(JournalLine {
            account: liability,
            cost_center: Some(first.cost_center.clone()),
            debit: 0.0,
            credit: total,
            party,
            tag: first.tag.clone(),
        });

        // One debit line per split. Percentage splits round to cents,
        // except the last split which takes the exact remainder so the
        // debits always sum to the credited total.
        let mut allocated = 0.0;
        let last = splits.len() - 1;
        for (i, split) in splits.iter().enumerate() {
            let amount = match (split.amount, split.percentage) {
                (Some(a), _) => round2(a),
                (None, Some(p)) => {
                    if i == last {
                        round2(total - allocated)
                    } else {
                        round2(total * p / 100.0)
                    }
                }
                (None, None) => {
                    return Err(CardpostError::Validation(
                        "Each split must provide an amount or a percentage".to_string(),
                    ))
                }
            };
            allocated = round2(allocated + amount);
            lines.push(JournalLine {
                account: expense.clone(),
                cost_center: Some(split.cost_center.clone()),
                debit: amount,
                credit: 0.0,
                party: None,
                tag: split.tag.clone(),
            });
        }
    } else {
        let cost_center = txn.cost_center.clone();
        lines.push(JournalLine {
            account: liability,
            cost_center: cost_center.clone(),
            debit: 0.0,
            credit: total,
            party: party.clone(),
            tag: None,
        });
        lines.push(JournalLine {
            account: expense,
            cost_center,
            debit: total,
            credit: 0.0,
            party,
            tag: None,
        });
    }

    let entry = JournalEntry {
        posting_date: if txn.date.is_empty() {
            Local::now().format("%Y-%m-%d").to_string()
        } else {
            txn.date.clone()
        },
        remark: entry_remark(txn),
        lines,
    };

    let debits: f64 = entry.lines.iter().map(|l| l.debit).sum();
    let credits: f64 = entry.lines.iter().map(|l| l.credit).sum();
    if cents(debits) != cents(credits) || cents(credits) != cents(total) {
        return Err(CardpostError::Balance { debits, credits });
    }

    Ok(entry)
}

/// Payable- and receivable-type accounts carry a counterparty on their
/// line; everything else posts without one.
fn account_requires_party(conn: &Connection, account: &str) -> Result<bool> {
    let account_type: Option<String> = conn
        .query_row(
            "SELECT account_type FROM accounts WHERE name = ?1",
            [account],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    Ok(matches!(account_type.as_deref(), Some("payable") | Some("receivable")))
}

/// The transaction's vendor, or the configured card-issuer party when no
/// vendor is set. The fallback entity is created on first use.
fn resolve_party(conn: &Connection, txn: &Transaction, settings: &Settings) -> Result<String> {
    if let Some(vendor) = txn.vendor.clone().filter(|v| !v.is_empty()) {
        return Ok(vendor);
    }
    if settings.card_issuer_party.is_empty() {
        return Err(CardpostError::Configuration(
            "No vendor on transaction and no card issuer party configured".to_string(),
        ));
    }
    conn.execute(
        "INSERT OR IGNORE INTO vendors (name) VALUES (?1)",
        [&settings.card_issuer_party],
    )?;
    Ok(settings.card_issuer_party.clone())
}

fn entry_remark(txn: &Transaction) -> String {
    let mut parts = vec![
        format!("Card ref: {}", txn.reference),
        format!("Card member: {}", txn.card_member),
        format!("Description: {}", txn.description),
    ];
    if let Some(vendor) = &txn.vendor {
        parts.push(format!("Vendor: {vendor}"));
    }
    if let Some(notes) = &txn.classification_notes {
        parts.push(format!("Notes: {notes}"));
    }
    parts.join(" | ")
}

/// Insert the entry and its lines as Submitted. Runs inside the caller's
/// storage transaction so insert-then-submit is atomic.
pub fn submit_entry(conn: &Connection, entry: &JournalEntry) -> Result<i64> {
    conn.execute(
        "INSERT INTO journal_entries (posting_date, remark, status) VALUES (?1, ?2, 'Submitted')",
        rusqlite::params![entry.posting_date, entry.remark],
    )?;
    let entry_id = conn.last_insert_rowid();
    for (position, line) in entry.lines.iter().enumerate() {
        conn.execute(
            "INSERT INTO journal_lines (entry_id, position, account, cost_center, debit, credit, party, tag) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                entry_id,
                position as i64,
                line.account,
                line.cost_center,
                line.debit,
                line.credit,
                line.party,
                line.tag,
            ],
        )?;
    }
    Ok(entry_id)
}

/// Cancel a submitted entry. History is never edited: the entry stays in
/// place with a Cancelled status and timestamp.
pub fn cancel_entry(conn: &Connection, entry_id: i64) -> Result<()> {
    let status: String = conn
        .query_row(
            "SELECT status FROM journal_entries WHERE id = ?1",
            [entry_id],
            |row| row.get(0),
        )
        .map_err(|_| {
            CardpostError::Validation(format!("No journal entry {entry_id} to reverse"))
        })?;
    if status != "Submitted" {
        return Err(CardpostError::Validation(format!(
            "Journal entry {entry_id} is not in a cancelable state ({status})"
        )));
    }
    conn.execute(
        "UPDATE journal_entries SET status = 'Cancelled', cancelled_at = ?2 WHERE id = ?1",
        rusqlite::params![entry_id, Local::now().format("%Y-%m-%d %H:%M:%S").to_string()],
    )?;
    Ok(())
}
