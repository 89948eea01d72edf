use comfy_table::{Cell, Table};

use crate::error::{CardpostError, Result};
use crate::fmt::percent;
use crate::memory;

pub fn list(limit: i64) -> Result<()> {
    let conn = super::open()?;
    let rules = memory::top_vendors(&conn, limit)?;
    if rules.is_empty() {
        println!("No learned rules yet. Classify a few transactions first.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Pattern", "Vendor", "Account", "Cost Center", "Confidence", "Used"]);
    for rule in rules {
        table.add_row(vec![
            Cell::new(&rule.pattern),
            Cell::new(rule.vendor.unwrap_or_default()),
            Cell::new(rule.expense_account.unwrap_or_default()),
            Cell::new(rule.cost_center.unwrap_or_default()),
            Cell::new(percent(rule.confidence)),
            Cell::new(rule.use_count),
        ]);
    }
    println!("Learned rules\n{table}");
    Ok(())
}

pub fn feedback(pattern: &str, reject: bool) -> Result<()> {
    let conn = super::open()?;
    let exists: bool = conn
        .prepare("SELECT 1 FROM rules WHERE vendor_pattern = ?1")?
        .exists([pattern])?;
    if !exists {
        return Err(CardpostError::Other(format!("No rule with pattern '{pattern}'")));
    }
    memory::record_feedback(&conn, pattern, !reject)?;
    println!(
        "Recorded {} for '{pattern}'",
        if reject { "rejection" } else { "acceptance" }
    );
    Ok(())
}
