use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::money;
use crate::lifecycle::review_queue;
use crate::memory;

pub fn run() -> Result<()> {
    let conn = super::open()?;
    let queue = review_queue(&conn)?;
    if queue.is_empty() {
        println!("Nothing to review.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Date", "Description", "Amount", "Status", "Vendor", "Account", "Suggestion",
    ]);
    for txn in &queue {
        let suggestion = match memory::suggest(&conn, &txn.description)? {
            Some(rule) => format!(
                "{} ({})",
                rule.expense_account.as_deref().unwrap_or("?"),
                crate::fmt::percent(rule.confidence)
            ),
            None => String::new(),
        };
        table.add_row(vec![
            Cell::new(txn.id),
            Cell::new(&txn.date),
            Cell::new(&txn.description),
            Cell::new(money(txn.amount)),
            Cell::new(txn.status.as_str()),
            Cell::new(txn.vendor.clone().unwrap_or_default()),
            Cell::new(txn.expense_account.clone().unwrap_or_default()),
            Cell::new(suggestion),
        ]);
    }
    println!("Review queue ({} transactions)\n{table}", queue.len());
    Ok(())
}
