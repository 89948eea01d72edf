use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::models::Batch;

pub fn list() -> Result<()> {
    let conn = super::open()?;
    let mut stmt = conn.prepare(
        "SELECT id, filename, card_account, total_count, pending_count, duplicate_count, \
                excluded_count, processed_count, status \
         FROM batches ORDER BY id DESC",
    )?;
    let batches: Vec<Batch> = stmt
        .query_map([], |row| {
            Ok(Batch {
                id: row.get(0)?,
                filename: row.get(1)?,
                card_account: row.get(2)?,
                total_count: row.get(3)?,
                pending_count: row.get(4)?,
                duplicate_count: row.get(5)?,
                excluded_count: row.get(6)?,
                processed_count: row.get(7)?,
                status: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if batches.is_empty() {
        println!("No batches imported yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "File", "Card", "Total", "Pending", "Dup", "Excl", "Posted", "Status",
    ]);
    for b in batches {
        table.add_row(vec![
            Cell::new(b.id),
            Cell::new(&b.filename),
            Cell::new(b.card_account.unwrap_or_default()),
            Cell::new(b.total_count),
            Cell::new(b.pending_count),
            Cell::new(b.duplicate_count),
            Cell::new(b.excluded_count),
            Cell::new(b.processed_count),
            Cell::new(&b.status),
        ]);
    }
    println!("Import batches\n{table}");
    Ok(())
}
