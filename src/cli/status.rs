use crate::db::get_connection;
use crate::error::Result;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join("cardpost.db");

    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());
    println!("Liability:  {}", settings.liability_account);
    println!(
        "ML:         {}",
        if settings.enable_ml_classification { "enabled" } else { "disabled" }
    );

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `cardpost init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    let batches: i64 = conn.query_row("SELECT count(*) FROM batches", [], |r| r.get(0))?;
    let transactions: i64 = conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?;
    let in_review: i64 = conn.query_row(
        "SELECT count(*) FROM transactions WHERE status IN ('Pending', 'Classified')",
        [],
        |r| r.get(0),
    )?;
    let posted: i64 = conn.query_row(
        "SELECT count(*) FROM transactions WHERE status = 'Posted'",
        [],
        |r| r.get(0),
    )?;
    let rules: i64 = conn.query_row("SELECT count(*) FROM rules", [], |r| r.get(0))?;

    println!();
    println!("Batches:       {batches}");
    println!("Transactions:  {transactions}");
    println!("In review:     {in_review}");
    println!("Posted:        {posted}");
    println!("Rules:         {rules}");
    Ok(())
}
