use std::path::PathBuf;

use colored::Colorize;
use rusqlite::Connection;

use crate::error::Result;
use crate::importer::import_file;
use crate::ml::{self, MlClassifier, PredictionRequest};
use crate::settings::load_settings;

pub fn run(file: &str, account: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let conn = super::open()?;

    let result = import_file(&conn, &PathBuf::from(file), account)?;
    if result.duplicate_file {
        println!("This file has already been imported (batch {}).", result.batch_id);
        return Ok(());
    }

    println!(
        "Imported batch {}: {} rows ({} pending, {} duplicates, {} excluded, {} skipped)",
        result.batch_id,
        result.total,
        result.pending.to_string().green(),
        result.duplicates,
        result.excluded,
        result.skipped
    );

    if let Some(classifier) = MlClassifier::from_settings(&settings) {
        let applied = auto_classify(&conn, &classifier, result.batch_id, settings.ml_auto_accept_threshold)?;
        if applied > 0 {
            println!("{applied} auto-classified; review with `cardpost review`");
        }
    }
    Ok(())
}

/// Run the external classifier over a batch's pending rows. Failures leave
/// rows Pending; this never blocks an import.
fn auto_classify(
    conn: &Connection,
    classifier: &MlClassifier,
    batch_id: i64,
    threshold: f64,
) -> Result<i64> {
    let mut stmt = conn.prepare(
        "SELECT id FROM transactions WHERE batch_id = ?1 AND status = 'Pending'",
    )?;
    let ids: Vec<i64> = stmt
        .query_map([batch_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut requests = Vec::with_capacity(ids.len());
    for id in &ids {
        let txn = crate::lifecycle::get_transaction(conn, *id)?;
        requests.push(PredictionRequest::from_transaction(&txn));
    }
    let predictions = classifier.predict_batch(&requests);

    let mut applied = 0;
    for (id, prediction) in ids.iter().zip(predictions.iter()) {
        if ml::apply_if_confident(conn, *id, prediction, threshold)? {
            applied += 1;
        }
    }
    Ok(applied)
}
