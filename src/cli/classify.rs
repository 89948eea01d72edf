use colored::Colorize;

use crate::enrichment;
use crate::error::Result;
use crate::fmt::percent;
use crate::lifecycle::{self, ClassifyArgs};
use crate::memory;
use crate::ml::{MlClassifier, PredictionRequest};
use crate::settings::load_settings;

#[allow(clippy::too_many_arguments)]
pub fn classify(
    id: i64,
    vendor: Option<&str>,
    account: Option<&str>,
    cost_center: Option<&str>,
    notes: Option<&str>,
    split_args: &[String],
    by: &str,
) -> Result<()> {
    let conn = super::open()?;
    let splits = if split_args.is_empty() {
        None
    } else {
        Some(
            split_args
                .iter()
                .map(|raw| super::parse_split(raw))
                .collect::<Result<Vec<_>>>()?,
        )
    };

    let txn = lifecycle::classify(
        &conn,
        id,
        ClassifyArgs {
            vendor: vendor.map(String::from),
            expense_account: account.map(String::from),
            cost_center: cost_center.map(String::from),
            notes: notes.map(String::from),
            splits,
            classified_by: by.to_string(),
        },
    )?;
    println!(
        "{} transaction {id}: {} \u{2192} {}",
        "Classified".green(),
        txn.description,
        txn.expense_account.as_deref().unwrap_or("(no account yet)")
    );
    Ok(())
}

pub fn approve(id: i64) -> Result<()> {
    let conn = super::open()?;
    let txn = lifecycle::approve(&conn, id)?;
    println!("{} transaction {id}: {}", "Approved".green(), txn.description);
    Ok(())
}

/// Show everything advisory we know about one transaction: the learned
/// rule, the external classifier's opinion, and a vendor-lookup hint.
pub fn suggest(id: i64) -> Result<()> {
    let settings = load_settings();
    let conn = super::open()?;
    let txn = lifecycle::get_transaction(&conn, id)?;

    println!("{} {}", txn.date, txn.description.bold());
    println!(
        "  {} {} {}",
        crate::fmt::money(txn.amount),
        txn.card_member,
        txn.account_number.as_deref().unwrap_or("")
    );

    match memory::suggest(&conn, &txn.description)? {
        Some(rule) => println!(
            "  memory: {} / {} / {} ({}, used {}x)",
            rule.vendor.as_deref().unwrap_or("?"),
            rule.expense_account.as_deref().unwrap_or("?"),
            rule.cost_center.as_deref().unwrap_or("?"),
            percent(rule.confidence),
            rule.use_count
        ),
        None => println!("  memory: no match"),
    }

    match MlClassifier::from_settings(&settings)
        .and_then(|c| c.predict(&PredictionRequest::from_transaction(&txn)))
    {
        Some(p) => println!(
            "  ml:     {} / {} ({})",
            p.vendor.as_deref().unwrap_or("?"),
            p.expense_account.as_deref().unwrap_or("?"),
            percent(p.confidence)
        ),
        None => println!("  ml:     unavailable"),
    }

    if let Some(hint) = enrichment::search_vendor(&settings, &txn.description) {
        println!(
            "  web:    {} {} {}",
            hint.suggested_name,
            hint.website,
            hint.category_guess
                .map(|c| format!("(looks like {c})"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
