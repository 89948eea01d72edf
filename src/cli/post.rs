use colored::Colorize;

use crate::error::{CardpostError, Result};
use crate::lifecycle;
use crate::settings::load_settings;

pub fn run(id: Option<i64>, all: bool) -> Result<()> {
    let settings = load_settings();
    let conn = super::open()?;

    match (id, all) {
        (Some(id), false) => {
            let entry_id = lifecycle::post(&conn, id, &settings)?;
            println!("{} transaction {id} (journal entry {entry_id})", "Posted".green());
            Ok(())
        }
        (None, true) => {
            let mut stmt =
                conn.prepare("SELECT id FROM transactions WHERE status = 'Approved' ORDER BY id")?;
            let ids: Vec<i64> = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            if ids.is_empty() {
                println!("No approved transactions to post.");
                return Ok(());
            }
            let mut posted = 0;
            for id in ids {
                match lifecycle::post(&conn, id, &settings) {
                    Ok(entry_id) => {
                        println!("{} transaction {id} (journal entry {entry_id})", "Posted".green());
                        posted += 1;
                    }
                    Err(e) => eprintln!("{} transaction {id}: {e}", "Skipped".yellow()),
                }
            }
            println!("{posted} posted.");
            Ok(())
        }
        _ => Err(CardpostError::Validation(
            "Provide a transaction ID or --all, not both".to_string(),
        )),
    }
}

pub fn reverse(id: i64) -> Result<()> {
    let conn = super::open()?;
    let txn = lifecycle::reverse(&conn, id)?;
    println!(
        "{} transaction {id}: {} is back to Approved",
        "Reversed".green(),
        txn.description
    );
    Ok(())
}
