use chrono::Local;
use rusqlite::Connection;

use crate::error::{CardpostError, Result};
use crate::journal;
use crate::memory;
use crate::models::{Split, Status, Transaction};
use crate::settings::Settings;

fn now_str() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

const TXN_COLUMNS: &str = "id, batch_id, card_account, date, description, card_member, \
     account_number, amount, reference, category, vendor, expense_account, cost_center, \
     classification_notes, classified_by, is_duplicate, is_excluded, status, journal_entry_id";

fn txn_from_row(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    let status: String = row.get(17)?;
    Ok(Transaction {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        card_account: row.get(2)?,
        date: row.get(3)?,
        description: row.get(4)?,
        card_member: row.get(5)?,
        account_number: row.get(6)?,
        amount: row.get(7)?,
        reference: row.get(8)?,
        category: row.get(9)?,
        vendor: row.get(10)?,
        expense_account: row.get(11)?,
        cost_center: row.get(12)?,
        classification_notes: row.get(13)?,
        classified_by: row.get(14)?,
        is_duplicate: row.get::<_, i64>(15)? != 0,
        is_excluded: row.get::<_, i64>(16)? != 0,
        status: Status::parse(&status).unwrap_or(Status::Pending),
        journal_entry_id: row.get(18)?,
    })
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<Transaction> {
    conn.query_row(
        &format!("SELECT {TXN_COLUMNS} FROM transactions WHERE id = ?1"),
        [id],
        txn_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => CardpostError::UnknownTransaction(id),
        other => CardpostError::Db(other),
    })
}

pub fn get_splits(conn: &Connection, transaction_id: i64) -> Result<Vec<Split>> {
    let mut stmt = conn.prepare(
        "SELECT cost_center, amount, percentage, tag, notes FROM splits \
         WHERE transaction_id = ?1 ORDER BY position",
    )?;
    let splits = stmt
        .query_map([transaction_id], |row| {
            Ok(Split {
                cost_center: row.get(0)?,
                amount: row.get(1)?,
                percentage: row.get(2)?,
                tag: row.get(3)?,
                notes: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(splits)
}

/// Splits must be homogeneous and total consistently: either every split
/// gives an explicit amount and they sum to the transaction's absolute
/// amount, or every split gives a percentage and they sum to 100, both
/// within a 0.01 tolerance. Mixed lists are rejected outright.
pub fn validate_splits(splits: &[Split], txn_amount: f64) -> Result<()> {
    if splits.is_empty() {
        return Ok(());
    }
    for split in splits {
        if split.amount.is_none() && split.percentage.is_none() {
            return Err(CardpostError::Validation(
                "Each split must provide an amount or a percentage".to_string(),
            ));
        }
    }
    let has_amount = splits.iter().any(|s| s.amount.is_some());
    let has_percentage = splits.iter().any(|s| s.percentage.is_some());
    if has_amount && has_percentage {
        return Err(CardpostError::Validation(
            "Cost center splits must use all amounts or all percentages, not a mix".to_string(),
        ));
    }
    if has_amount {
        let total: f64 = splits.iter().filter_map(|s| s.amount).sum();
        if (total - txn_amount.abs()).abs() > 0.01 {
            return Err(CardpostError::Validation(format!(
                "Cost center split amounts ({total:.2}) must equal transaction amount ({:.2})",
                txn_amount.abs()
            )));
        }
    } else {
        let total: f64 = splits.iter().filter_map(|s| s.percentage).sum();
        if (total - 100.0).abs() > 0.01 {
            return Err(CardpostError::Validation(format!(
                "Cost center split percentages ({total:.2}%) must total 100%"
            )));
        }
    }
    Ok(())
}

/// Fields applied by a classify call. Omitted fields keep their prior
/// values; a provided split list replaces the existing one wholesale.
#[derive(Debug, Default)]
pub struct ClassifyArgs {
    pub vendor: Option<String>,
    pub expense_account: Option<String>,
    pub cost_center: Option<String>,
    pub notes: Option<String>,
    pub splits: Option<Vec<Split>>,
    pub classified_by: String,
}

/// Apply a classification. Allowed from Pending or Classified; moves to
/// Classified and feeds the classification memory once an expense account
/// is known.
pub fn classify(conn: &Connection, id: i64, args: ClassifyArgs) -> Result<Transaction> {
    let txn = get_transaction(conn, id)?;
    if !matches!(txn.status, Status::Pending | Status::Classified) {
        return Err(CardpostError::InvalidState {
            action: "classify",
            status: txn.status.as_str().to_string(),
        });
    }

    if let Some(splits) = &args.splits {
        validate_splits(splits, txn.amount)?;
    }

    conn.execute(
        "UPDATE transactions SET \
             vendor = COALESCE(?1, vendor), \
             expense_account = COALESCE(?2, expense_account), \
             cost_center = COALESCE(?3, cost_center), \
             classification_notes = COALESCE(?4, classification_notes), \
             classified_by = ?5, classification_date = ?6, status = ?7 \
         WHERE id = ?8",
        rusqlite::params![
            args.vendor,
            args.expense_account,
            args.cost_center,
            args.notes,
            args.classified_by,
            now_str(),
            Status::Classified.as_str(),
            id,
        ],
    )?;

    if let Some(splits) = &args.splits {
        conn.execute("DELETE FROM splits WHERE transaction_id = ?1", [id])?;
        for (position, split) in splits.iter().enumerate() {
            conn.execute(
                "INSERT INTO splits (transaction_id, position, cost_center, amount, percentage, tag, notes) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id,
                    position as i64,
                    split.cost_center,
                    split.amount,
                    split.percentage,
                    split.tag,
                    split.notes,
                ],
            )?;
        }
    }

    let updated = get_transaction(conn, id)?;
    if updated.expense_account.is_some() {
        memory::learn(
            conn,
            &updated.description,
            updated.vendor.as_deref(),
            updated.expense_account.as_deref(),
            updated.cost_center.as_deref(),
        )?;
    }
    Ok(updated)
}

/// Move a classified transaction to Approved. Requires an expense account
/// and either a cost center or at least one split.
pub fn approve(conn: &Connection, id: i64) -> Result<Transaction> {
    let txn = get_transaction(conn, id)?;
    if txn.status != Status::Classified {
        return Err(CardpostError::InvalidState {
            action: "approve",
            status: txn.status.as_str().to_string(),
        });
    }
    if txn.expense_account.is_none() {
        return Err(CardpostError::Validation(
            "Expense account is required for approval".to_string(),
        ));
    }
    let splits = get_splits(conn, id)?;
    if txn.cost_center.is_none() && splits.is_empty() {
        return Err(CardpostError::Validation(
            "Cost center or cost center splits are required for approval".to_string(),
        ));
    }
    conn.execute(
        "UPDATE transactions SET status = ?1 WHERE id = ?2",
        rusqlite::params![Status::Approved.as_str(), id],
    )?;
    get_transaction(conn, id)
}

/// Post an approved transaction: build and submit a balanced journal
/// entry, then record the entry reference and posted timestamp. Runs in
/// one storage transaction; a builder failure leaves the row Approved
/// with nothing written.
pub fn post(conn: &Connection, id: i64, settings: &Settings) -> Result<i64> {
    let txn = get_transaction(conn, id)?;
    if txn.status != Status::Approved {
        return Err(CardpostError::InvalidState {
            action: "post",
            status: txn.status.as_str().to_string(),
        });
    }
    if txn.is_duplicate || txn.is_excluded {
        return Err(CardpostError::Validation(
            "Cannot post duplicate or excluded transactions".to_string(),
        ));
    }
    let splits = get_splits(conn, id)?;

    let tx = conn.unchecked_transaction()?;
    let entry = journal::build(&tx, &txn, &splits, settings)?;
    let entry_id = journal::submit_entry(&tx, &entry)?;
    tx.execute(
        "UPDATE transactions SET journal_entry_id = ?1, posted_date = ?2, status = ?3 \
         WHERE id = ?4",
        rusqlite::params![entry_id, now_str(), Status::Posted.as_str(), id],
    )?;
    if let Some(batch_id) = txn.batch_id {
        tx.execute(
            "UPDATE batches SET processed_count = processed_count + 1, \
                                pending_count = MAX(0, pending_count - 1) \
             WHERE id = ?1",
            [batch_id],
        )?;
    }
    tx.commit()?;
    Ok(entry_id)
}

/// Reverse a posted transaction: cancel its journal entry and return the
/// row to Approved. The entry itself is kept as history.
pub fn reverse(conn: &Connection, id: i64) -> Result<Transaction> {
    let txn = get_transaction(conn, id)?;
    if txn.status != Status::Posted {
        return Err(CardpostError::InvalidState {
            action: "reverse",
            status: txn.status.as_str().to_string(),
        });
    }
    let entry_id = txn.journal_entry_id.ok_or_else(|| {
        CardpostError::Validation("Transaction has no journal entry to reverse".to_string())
    })?;

    let tx = conn.unchecked_transaction()?;
    journal::cancel_entry(&tx, entry_id)?;
    tx.execute(
        "UPDATE transactions SET journal_entry_id = NULL, posted_date = NULL, status = ?1 \
         WHERE id = ?2",
        rusqlite::params![Status::Approved.as_str(), id],
    )?;
    if let Some(batch_id) = txn.batch_id {
        tx.execute(
            "UPDATE batches SET processed_count = MAX(0, processed_count - 1), \
                                pending_count = pending_count + 1 \
             WHERE id = ?1",
            [batch_id],
        )?;
    }
    tx.commit()?;
    get_transaction(conn, id)
}

/// The review queue: everything still awaiting classification or
/// approval. Duplicate and excluded rows never appear here.
pub fn review_queue(conn: &Connection) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TXN_COLUMNS} FROM transactions \
         WHERE status IN ('Pending', 'Classified') ORDER BY date, id"
    ))?;
    let rows = stmt
        .query_map([], txn_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
